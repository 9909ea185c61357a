//! Response mapper: the single boundary where RPC bodies become typed values

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use super::error::{ApiError, ServiceErrorBody};

/// Decodes an RPC response body. Non-2xx statuses become `ApiError::Service`,
/// bodies that do not match `T` become `ApiError::Decode` with the raw text.
pub fn decode<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ApiError> {
    if !(200..300).contains(&status) {
        return Err(service_error(status, body));
    }

    serde_json::from_str::<T>(body).map_err(|e| {
        tracing::error!("Failed to decode response: {}, body: {}", e, body);
        ApiError::Decode {
            message: e.to_string(),
            body: body.to_string(),
        }
    })
}

fn service_error(status: u16, body: &str) -> ApiError {
    match serde_json::from_str::<ServiceErrorBody>(body) {
        Ok(err) => ApiError::Service {
            status,
            code: err.code,
            message: err.message,
            request_id: err.request_id,
        },
        Err(_) => ApiError::Service {
            status,
            code: "UnknownError".to_string(),
            message: body.to_string(),
            request_id: String::new(),
        },
    }
}

/// Envelope carried by every successful RPC response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Empty {
    #[serde(default)]
    pub request_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    #[serde(alias = "TagKey")]
    pub key: String,
    #[serde(alias = "TagValue", default)]
    pub value: String,
}

impl Tag {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    /// Tags managed by the platform itself
    pub fn is_system(&self) -> bool {
        ["aliyun", "acs:", "http://", "https://"]
            .iter()
            .any(|prefix| self.key.starts_with(prefix))
    }
}

pub fn tags_to_map(tags: &[Tag]) -> HashMap<String, String> {
    tags.iter()
        .filter(|t| !t.is_system())
        .map(|t| (t.key.clone(), t.value.clone()))
        .collect()
}

/// Sorted by key so the generated `Tag.N.*` parameters are stable
pub fn map_to_tags(map: &HashMap<String, String>) -> Vec<Tag> {
    let mut tags: Vec<Tag> = map.iter().map(|(k, v)| Tag::new(k, v)).collect();
    tags.sort_by(|a, b| a.key.cmp(&b.key));
    tags
}

/// Accepts `{"Vpc": [...]}`, a bare list, or null for list fields
pub fn wrapped_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let list = match value {
        serde_json::Value::Null => return Ok(Vec::new()),
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(map) if map.len() == 1 => match map.into_iter().next() {
            Some((_, serde_json::Value::Array(items))) => items,
            Some((_, serde_json::Value::Null)) | None => Vec::new(),
            Some((key, other)) => {
                return Err(serde::de::Error::custom(format!(
                    "expected list under {}, got {}",
                    key, other
                )))
            }
        },
        other => {
            return Err(serde::de::Error::custom(format!(
                "expected wrapped list, got {}",
                other
            )))
        }
    };
    list.into_iter()
        .map(|item| serde_json::from_value(item).map_err(serde::de::Error::custom))
        .collect()
}

pub mod string_or_u64 {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrU64 {
        String(String),
        U64(u64),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match StringOrU64::deserialize(deserializer)? {
            StringOrU64::String(s) if s.is_empty() => Ok(0),
            StringOrU64::String(s) => s.parse::<u64>().map_err(serde::de::Error::custom),
            StringOrU64::U64(u) => Ok(u),
        }
    }

    pub mod option {
        use super::StringOrU64;
        use serde::{Deserialize, Deserializer};

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<StringOrU64>::deserialize(deserializer)? {
                Some(StringOrU64::String(s)) if s.is_empty() => Ok(None),
                Some(StringOrU64::String(s)) => {
                    s.parse::<u64>().map(Some).map_err(serde::de::Error::custom)
                }
                Some(StringOrU64::U64(u)) => Ok(Some(u)),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Listing {
        #[serde(deserialize_with = "string_or_u64::deserialize")]
        total_count: u64,
        #[serde(default, deserialize_with = "string_or_u64::option::deserialize")]
        bandwidth: Option<u64>,
        #[serde(default, deserialize_with = "wrapped_list")]
        tags: Vec<Tag>,
    }

    #[test]
    fn decode_maps_error_bodies_to_service_errors() {
        let body = r#"{"RequestId":"R1","HostId":"vpc.aliyuncs.com","Code":"InvalidVpcID.NotFound","Message":"gone"}"#;
        let err = decode::<Empty>(404, body).unwrap_err();
        match err {
            ApiError::Service {
                status,
                code,
                request_id,
                ..
            } => {
                assert_eq!(status, 404);
                assert_eq!(code, "InvalidVpcID.NotFound");
                assert_eq!(request_id, "R1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn decode_keeps_raw_body_on_shape_mismatch() {
        let err = decode::<Listing>(200, r#"{"TotalCount":"#).unwrap_err();
        assert!(matches!(err, ApiError::Decode { ref body, .. } if body == r#"{"TotalCount":"#));
        assert!(err.need_retry());
    }

    #[test]
    fn non_json_error_body_is_unknown_error() {
        let err = decode::<Empty>(502, "<html>Bad Gateway</html>").unwrap_err();
        assert_eq!(err.code(), Some("UnknownError"));
        assert!(err.need_retry());
    }

    #[test]
    fn serde_helpers_absorb_wire_quirks() {
        let listing: Listing = decode(
            200,
            r#"{"TotalCount":"12","Bandwidth":5,"Tags":{"Tag":[{"Key":"env","Value":"prod"},{"TagKey":"acs:rm:rgId","TagValue":"rg-1"}]}}"#,
        )
        .unwrap();
        assert_eq!(listing.total_count, 12);
        assert_eq!(listing.bandwidth, Some(5));
        assert_eq!(listing.tags.len(), 2);

        let map = tags_to_map(&listing.tags);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("env").map(String::as_str), Some("prod"));

        let listing: Listing = decode(200, r#"{"TotalCount":0,"Bandwidth":"","Tags":null}"#).unwrap();
        assert_eq!(listing.bandwidth, None);
        assert!(listing.tags.is_empty());
    }

    #[test]
    fn map_to_tags_is_sorted() {
        let map: HashMap<String, String> = [("b", "2"), ("a", "1")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let tags = map_to_tags(&map);
        assert_eq!(tags, vec![Tag::new("a", "1"), Tag::new("b", "2")]);
    }
}
