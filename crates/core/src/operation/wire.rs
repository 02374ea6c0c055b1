use super::{Any, Operation, OperationResult, Status};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireOperation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<WireAny>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response: Option<WireAny>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<WireStatus>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireAny {
    type_url: String,
    #[serde(default)]
    value: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct WireStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

impl WireAny {
    fn decode(self, field: &str) -> Result<Any, String> {
        let value = STANDARD
            .decode(self.value.as_bytes())
            .map_err(|e| format!("{field}.value is not valid base64: {e}"))?;
        Ok(Any::new(self.type_url, value))
    }
}

impl From<&Any> for WireAny {
    fn from(any: &Any) -> Self {
        Self {
            type_url: any.type_url.clone(),
            value: STANDARD.encode(&any.value),
        }
    }
}

impl TryFrom<WireOperation> for Operation {
    type Error = String;

    fn try_from(wire: WireOperation) -> Result<Self, Self::Error> {
        let id = match wire.name {
            Some(name) if !name.is_empty() => name,
            _ => return Err("operation name is missing".to_owned()),
        };

        let metadata = wire.metadata.map(|m| m.decode("metadata")).transpose()?;

        let result = match (wire.done, wire.response, wire.error) {
            (false, None, None) => None,
            (false, _, _) => {
                return Err(format!("operation {id} is not done but carries a result"));
            }
            (true, Some(_), Some(_)) => {
                return Err(format!(
                    "operation {id} reports both a response and an error"
                ));
            }
            (true, None, None) => {
                return Err(format!(
                    "operation {id} is done but carries neither a response nor an error"
                ));
            }
            (true, Some(response), None) => {
                Some(OperationResult::Response(response.decode("response")?))
            }
            (true, None, Some(error)) => Some(OperationResult::Error(Status {
                code: error.code,
                message: error.message,
            })),
        };

        Ok(Operation {
            id,
            metadata,
            result,
        })
    }
}

impl From<Operation> for WireOperation {
    fn from(op: Operation) -> Self {
        let mut wire = WireOperation {
            name: Some(op.id),
            done: op.result.is_some(),
            metadata: op.metadata.as_ref().map(WireAny::from),
            ..Default::default()
        };
        match op.result {
            Some(OperationResult::Response(any)) => wire.response = Some(WireAny::from(&any)),
            Some(OperationResult::Error(status)) => {
                wire.error = Some(WireStatus {
                    code: status.code,
                    message: status.message,
                })
            }
            None => {}
        }
        wire
    }
}
