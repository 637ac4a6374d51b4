use crate::error::Result;
use crate::function_schema::{ObjectSchema, ParamSchema};
use crate::tools::{typed_args, Tool};
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct CurrentTimeArgs {
    #[serde(default)]
    format: Option<String>,
}

/// Local wall-clock time.
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "currentTime"
    }

    fn description(&self) -> &str {
        "Get the current time on the machine"
    }

    fn parameters(&self) -> ObjectSchema {
        ObjectSchema::new().optional(
            "format",
            ParamSchema::enumeration(&["12h", "24h"])
                .describe("The time format to use (12h or 24h). Defaults to 24h."),
        )
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let args: CurrentTimeArgs = typed_args(self.name(), args)?;
        Ok(format_time(&Local::now(), args.format.as_deref() == Some("12h")))
    }
}

fn format_time<Tz: TimeZone>(at: &DateTime<Tz>, twelve_hour: bool) -> String
where
    Tz::Offset: std::fmt::Display,
{
    if twelve_hour {
        at.format("%-I:%M %p").to_string()
    } else {
        at.format("%H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_formats() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 15, 4, 0).unwrap();
        assert_eq!(format_time(&at, false), "15:04");
        assert_eq!(format_time(&at, true), "3:04 PM");
    }

    #[tokio::test]
    async fn test_execute_default_is_24h() {
        let out = CurrentTimeTool.execute(json!({})).await.unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(&out[2..3], ":");
    }
}
