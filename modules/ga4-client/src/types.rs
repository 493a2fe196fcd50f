use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One event in a Measurement Protocol request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeasurementEvent {
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

/// Body of `POST /mp/collect`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeasurementPayload {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_micros: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_properties: Option<Map<String, Value>>,
    pub events: Vec<MeasurementEvent>,
}

impl MeasurementPayload {
    pub fn single(client_id: impl Into<String>, event: MeasurementEvent) -> Self {
        Self {
            client_id: client_id.into(),
            user_id: None,
            timestamp_micros: None,
            user_properties: None,
            events: vec![event],
        }
    }

    pub fn user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id.filter(|u| !u.is_empty());
        self
    }

    /// Attach user properties, wrapping bare values as `{"value": v}`.
    pub fn user_properties(mut self, props: Option<Map<String, Value>>) -> Self {
        self.user_properties = props
            .filter(|p| !p.is_empty())
            .map(normalize_user_properties);
        self
    }
}

fn normalize_user_properties(props: Map<String, Value>) -> Map<String, Value> {
    props
        .into_iter()
        .map(|(key, value)| {
            let wrapped = match value {
                Value::Object(ref obj) if obj.contains_key("value") => value,
                other => serde_json::json!({ "value": other }),
            };
            (key, wrapped)
        })
        .collect()
}

/// Response of the validation endpoint `POST /debug/mp/collect`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    #[serde(default)]
    pub validation_messages: Vec<ValidationMessage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationMessage {
    #[serde(default)]
    pub field_path: Option<String>,
    pub description: String,
    #[serde(default)]
    pub validation_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_user_properties_are_wrapped() {
        let mut props = Map::new();
        props.insert("plan".into(), json!("pro"));
        props.insert("tier".into(), json!({"value": 3}));

        let payload = MeasurementPayload::single(
            "123.456",
            MeasurementEvent {
                name: "sign_up".into(),
                params: Map::new(),
            },
        )
        .user_properties(Some(props));

        let props = payload.user_properties.unwrap();
        assert_eq!(props["plan"], json!({"value": "pro"}));
        assert_eq!(props["tier"], json!({"value": 3}));
    }

    #[test]
    fn optional_fields_are_omitted() {
        let payload = MeasurementPayload::single(
            "123.456",
            MeasurementEvent {
                name: "page_view".into(),
                params: Map::new(),
            },
        )
        .user_id(Some(String::new()));

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            json!({"client_id": "123.456", "events": [{"name": "page_view"}]})
        );
    }
}
