//! Extracts typed results from Qloo JSON responses.
//!
//! Responses are read leniently: items missing an ID, a name, or a
//! coordinate are skipped rather than failing the whole response.

use resonance_qloo_models::{HeatmapPoint, InsightCategory, InsightItem, QlooTag, SearchEntity};
use serde_json::Value;

/// Parses a `/search` response.
#[must_use]
pub fn parse_search_entities(body: &Value) -> Vec<SearchEntity> {
    results_array(body, None)
        .iter()
        .filter_map(|item| {
            Some(SearchEntity {
                entity_id: string_field(item, &["entity_id", "id"])?,
                name: string_field(item, &["name"])?,
                types: item
                    .get("types")
                    .and_then(Value::as_array)
                    .map(|types| {
                        types
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            })
        })
        .collect()
}

/// Parses a `/v2/tags` response.
#[must_use]
pub fn parse_tags(body: &Value) -> Vec<QlooTag> {
    results_array(body, Some("tags"))
        .iter()
        .filter_map(|item| {
            Some(QlooTag {
                id: string_field(item, &["id", "tag_id"])?,
                name: string_field(item, &["name"])?,
            })
        })
        .collect()
}

/// Parses a heatmap `/v2/insights` response.
#[must_use]
pub fn parse_heatmap(body: &Value) -> Vec<HeatmapPoint> {
    results_array(body, Some("heatmap"))
        .iter()
        .filter_map(|point| {
            let location = point.get("location")?;
            let query = point.get("query");
            let score = |key: &str| query.and_then(|q| q.get(key)).and_then(Value::as_f64);

            Some(HeatmapPoint {
                latitude: location.get("latitude").and_then(Value::as_f64)?,
                longitude: location.get("longitude").and_then(Value::as_f64)?,
                geohash: location
                    .get("geohash")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                affinity: score("affinity").unwrap_or(0.0),
                popularity: score("popularity").unwrap_or(0.0),
                affinity_rank: score("affinity_rank"),
            })
        })
        .collect()
}

/// Parses an entity or tag `/v2/insights` response.
#[must_use]
pub fn parse_insights(body: &Value, category: InsightCategory) -> Vec<InsightItem> {
    let key = if category == InsightCategory::Tags {
        "tags"
    } else {
        "entities"
    };

    results_array(body, Some(key))
        .iter()
        .filter_map(|item| {
            let query = item.get("query");
            Some(InsightItem {
                id: string_field(item, &["entity_id", "tag_id", "id"])?,
                name: string_field(item, &["name"])?,
                affinity: query
                    .and_then(|q| q.get("affinity"))
                    .and_then(Value::as_f64),
                popularity: item.get("popularity").and_then(Value::as_f64),
                subtype: string_field(item, &["subtype"]),
            })
        })
        .collect()
}

/// `results` when it is an array, else `results.<nested>`.
fn results_array<'a>(body: &'a Value, nested: Option<&str>) -> &'a [Value] {
    let results = body.get("results");
    let array = match (results, nested) {
        (Some(Value::Array(items)), _) => Some(items),
        (Some(obj), Some(key)) => obj.get(key).and_then(Value::as_array),
        _ => None,
    };
    array.map(Vec::as_slice).unwrap_or_default()
}

fn string_field(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| item.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn search_entities_keep_response_order() {
        let body = json!({
            "results": [
                { "entity_id": "E1", "name": "Jane Doe", "types": ["urn:entity:person"] },
                { "name": "missing id" },
                { "entity_id": "E2", "name": "Jane Doe Jr." }
            ]
        });
        let entities = parse_search_entities(&body);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].entity_id, "E1");
        assert_eq!(entities[0].types, vec!["urn:entity:person".to_string()]);
        assert!(entities[1].types.is_empty());
    }

    #[test]
    fn tags_are_read_from_nested_results() {
        let body = json!({
            "results": { "tags": [
                { "id": "urn:tag:keyword:qloo:gun_violence", "name": "Gun Violence" },
                { "tag_id": "urn:tag:keyword:qloo:guns", "name": "Guns" }
            ] }
        });
        let tags = parse_tags(&body);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1].id, "urn:tag:keyword:qloo:guns");
    }

    #[test]
    fn heatmap_points_skip_missing_coordinates() {
        let body = json!({
            "results": { "heatmap": [
                {
                    "location": { "latitude": 40.7, "longitude": -74.0, "geohash": "dr5reg" },
                    "query": { "affinity": 0.8, "popularity": 0.65, "affinity_rank": 0.9 }
                },
                { "location": { "latitude": 40.8 }, "query": { "affinity": 0.1 } },
                { "location": { "latitude": 40.9, "longitude": -73.9 } }
            ] }
        });
        let points = parse_heatmap(&body);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].geohash.as_deref(), Some("dr5reg"));
        assert_eq!(points[0].affinity_rank, Some(0.9));
        assert!(points[1].popularity.abs() < f64::EPSILON);
    }

    #[test]
    fn insights_read_entities_or_tags_by_category() {
        let entities = json!({
            "results": { "entities": [
                { "entity_id": "B1", "name": "Acme", "popularity": 0.97,
                  "query": { "affinity": 0.88 }, "subtype": "urn:entity:brand" }
            ] }
        });
        let brands = parse_insights(&entities, InsightCategory::Brands);
        assert_eq!(brands.len(), 1);
        assert_eq!(brands[0].affinity, Some(0.88));
        assert!(parse_insights(&entities, InsightCategory::Tags).is_empty());

        let tags = json!({
            "results": { "tags": [ { "tag_id": "T1", "name": "Hiking" } ] }
        });
        let parsed = parse_insights(&tags, InsightCategory::Tags);
        assert_eq!(parsed[0].name, "Hiking");
        assert_eq!(parsed[0].affinity, None);
    }

    #[test]
    fn unexpected_shapes_yield_nothing() {
        assert!(parse_heatmap(&json!({ "error": "bad key" })).is_empty());
        assert!(parse_tags(&json!({ "results": 5 })).is_empty());
    }
}
