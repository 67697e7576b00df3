use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use serde_json::{json, Map, Value};

use crate::config::{ApiKey, HrApiConfig, DARWINBOX_PASSWORD, DARWINBOX_USERNAME};
use crate::error::{DefinitionError, ToolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    StringList,
    Boolean,
}

impl ParamType {
    fn schema(self) -> Value {
        match self {
            ParamType::String => json!({ "type": "string" }),
            ParamType::StringList => json!({ "type": "array", "items": { "type": "string" } }),
            ParamType::Boolean => json!({ "type": "boolean" }),
        }
    }
}

/// One named input the model supplies when calling a tool.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamType,
    pub required: bool,
    pub description: &'static str,
    /// Substituted when an optional parameter is omitted.
    pub default: Option<Value>,
}

impl Param {
    pub fn required(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
            default: None,
        }
    }

    pub fn optional(name: &'static str, kind: ParamType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// How a request body field gets its value.
#[derive(Debug, Clone)]
pub enum ValueRule {
    /// Parameter passed through unchanged.
    Param(&'static str),
    /// String parameter, whitespace trimmed, must not be empty.
    Trimmed(&'static str),
    /// List parameter with every element trimmed.
    TrimmedList(&'static str),
    /// String parameter trimmed and sent as a one-element list.
    Wrapped(&'static str),
    /// `YYYY-MM-DD` converted to `DD-MM-YYYY`.
    DayFirst(&'static str),
    /// `YYYY-MM-DD` converted to `DD-MM-YYYY 00:00:00`.
    DayStart(&'static str),
    /// `YYYY-MM-DD` converted to `DD-MM-YYYY 23:59:59`.
    DayEnd(&'static str),
    /// Validated `YYYY-MM`.
    Month(&'static str),
    /// Year string, current year when omitted.
    YearOrCurrent(&'static str),
    /// Boolean rendered as `"yes"` / `"no"`.
    YesNo(&'static str),
    /// Boolean rendered as `"paid"` / `"unpaid"`.
    PaidUnpaid(&'static str),
    /// Capitalized leave action, one of Approved, Rejected, Revoked.
    LeaveAction(&'static str),
    /// `"1"` for first half, `"2"` for second; field omitted unless `half_day` is true.
    HalfDaySlot {
        half_day: &'static str,
        first_half: &'static str,
    },
    /// API key read from the runtime environment.
    ApiKey(ApiKey),
    Const(&'static str),
    /// A list holding a single object built from nested fields.
    Records(Vec<BodyField>),
}

const LEAVE_ACTIONS: [&str; 3] = ["Approved", "Rejected", "Revoked"];

impl ValueRule {
    fn params(&self, out: &mut Vec<&'static str>) {
        match self {
            ValueRule::Param(p)
            | ValueRule::Trimmed(p)
            | ValueRule::TrimmedList(p)
            | ValueRule::Wrapped(p)
            | ValueRule::DayFirst(p)
            | ValueRule::DayStart(p)
            | ValueRule::DayEnd(p)
            | ValueRule::Month(p)
            | ValueRule::YearOrCurrent(p)
            | ValueRule::YesNo(p)
            | ValueRule::PaidUnpaid(p)
            | ValueRule::LeaveAction(p) => out.push(*p),
            ValueRule::HalfDaySlot {
                half_day,
                first_half,
            } => {
                out.push(*half_day);
                out.push(*first_half);
            }
            ValueRule::Records(fields) => {
                for f in fields {
                    f.value.params(out);
                }
            }
            ValueRule::ApiKey(_) | ValueRule::Const(_) => {}
        }
    }

    /// Declarative form read by `runtime/hr_agent.py` inside the hosted agent.
    fn manifest(&self) -> Value {
        match self {
            ValueRule::Param(p) => json!({ "param": p }),
            ValueRule::Trimmed(p) => json!({ "param": p, "transform": "trim" }),
            ValueRule::TrimmedList(p) => json!({ "param": p, "transform": "trim_each" }),
            ValueRule::Wrapped(p) => json!({ "param": p, "transform": "wrap_list" }),
            ValueRule::DayFirst(p) => json!({ "param": p, "transform": "date_dd_mm_yyyy" }),
            ValueRule::DayStart(p) => json!({ "param": p, "transform": "day_start" }),
            ValueRule::DayEnd(p) => json!({ "param": p, "transform": "day_end" }),
            ValueRule::Month(p) => json!({ "param": p, "transform": "month" }),
            ValueRule::YearOrCurrent(p) => json!({ "param": p, "transform": "year_or_current" }),
            ValueRule::YesNo(p) => json!({ "param": p, "transform": "yes_no" }),
            ValueRule::PaidUnpaid(p) => json!({ "param": p, "transform": "paid_unpaid" }),
            ValueRule::LeaveAction(p) => json!({
                "param": p,
                "transform": "capitalize",
                "allowed": LEAVE_ACTIONS,
            }),
            ValueRule::HalfDaySlot {
                half_day,
                first_half,
            } => json!({
                "param": first_half,
                "transform": "half_day_slot",
                "when": half_day,
            }),
            ValueRule::ApiKey(key) => json!({ "env": key.env_name() }),
            ValueRule::Const(c) => json!({ "const": c }),
            ValueRule::Records(fields) => json!({ "records": fields_manifest(fields) }),
        }
    }

    fn render(&self, args: &Args) -> Result<Option<Value>, ToolError> {
        let value = match self {
            ValueRule::Param(p) => args.get(p).cloned().unwrap_or(Value::Null),
            ValueRule::Trimmed(p) => Value::String(non_empty(p, args.string(p)?)?),
            ValueRule::TrimmedList(p) => Value::Array(
                args.list(p)?
                    .into_iter()
                    .map(|s| Value::String(s.trim().to_string()))
                    .collect(),
            ),
            ValueRule::Wrapped(p) => {
                Value::Array(vec![Value::String(non_empty(p, args.string(p)?)?)])
            }
            ValueRule::DayFirst(p) => {
                Value::String(parse_date(p, &args.string(p)?)?.format("%d-%m-%Y").to_string())
            }
            ValueRule::DayStart(p) => Value::String(
                parse_date(p, &args.string(p)?)?
                    .format("%d-%m-%Y 00:00:00")
                    .to_string(),
            ),
            ValueRule::DayEnd(p) => Value::String(
                parse_date(p, &args.string(p)?)?
                    .format("%d-%m-%Y 23:59:59")
                    .to_string(),
            ),
            ValueRule::Month(p) => {
                let raw = args.string(p)?;
                // chrono needs a day to parse a date; pin it to the first.
                NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d").map_err(|_| {
                    ToolError::InvalidArgument {
                        name: p.to_string(),
                        reason: "must be in YYYY-MM format".into(),
                    }
                })?;
                Value::String(raw)
            }
            ValueRule::YearOrCurrent(p) => match args.get(p) {
                Some(Value::String(y)) if !y.trim().is_empty() => Value::String(y.trim().into()),
                _ => Value::String(args.today.year().to_string()),
            },
            ValueRule::YesNo(p) => Value::from(if args.flag(p)? { "yes" } else { "no" }),
            ValueRule::PaidUnpaid(p) => {
                Value::from(if args.flag(p)? { "paid" } else { "unpaid" })
            }
            ValueRule::LeaveAction(p) => {
                let raw = args.string(p)?;
                let action = capitalize(raw.trim());
                if !LEAVE_ACTIONS.contains(&action.as_str()) {
                    return Err(ToolError::InvalidArgument {
                        name: p.to_string(),
                        reason: format!(
                            "{raw} is not one of Approved, Rejected, Revoked"
                        ),
                    });
                }
                Value::String(action)
            }
            ValueRule::HalfDaySlot {
                half_day,
                first_half,
            } => {
                if !args.flag(half_day)? {
                    return Ok(None);
                }
                Value::from(if args.flag(first_half)? { "1" } else { "2" })
            }
            ValueRule::ApiKey(key) => Value::String(format!("${{{}}}", key.env_name())),
            ValueRule::Const(c) => Value::String(c.to_string()),
            ValueRule::Records(fields) => Value::Array(vec![render_fields(fields, args)?]),
        };
        Ok(Some(value))
    }
}

/// A named field of the JSON request body.
#[derive(Debug, Clone)]
pub struct BodyField {
    pub name: &'static str,
    pub value: ValueRule,
}

impl BodyField {
    pub fn new(name: &'static str, value: ValueRule) -> Self {
        Self { name, value }
    }
}

fn fields_manifest(fields: &[BodyField]) -> Value {
    let mut map = Map::new();
    for f in fields {
        map.insert(f.name.to_string(), f.value.manifest());
    }
    Value::Object(map)
}

fn render_fields(fields: &[BodyField], args: &Args) -> Result<Value, ToolError> {
    let mut map = Map::new();
    for f in fields {
        if let Some(v) = f.value.render(args)? {
            map.insert(f.name.to_string(), v);
        }
    }
    Ok(Value::Object(map))
}

/// How the hosted tool wraps the HR API's JSON response before returning it
/// to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseEnvelope {
    /// Response JSON returned unchanged.
    Raw,
    /// `{"status": "success", "data": <response>}`.
    StatusData,
    /// Like `StatusData`, plus an `employee_count` of the records returned.
    Directory,
}

impl ResponseEnvelope {
    fn as_str(self) -> &'static str {
        match self {
            ResponseEnvelope::Raw => "raw",
            ResponseEnvelope::StatusData => "status_data",
            ResponseEnvelope::Directory => "directory",
        }
    }
}

/// The HR API call a tool makes. Always a JSON `POST` with HTTP basic auth.
#[derive(Debug, Clone)]
pub struct HttpBinding {
    pub path: &'static str,
    pub timeout: Duration,
    pub body: Vec<BodyField>,
    pub envelope: ResponseEnvelope,
}

impl HttpBinding {
    pub fn post(path: &'static str, body: Vec<BodyField>) -> Self {
        Self {
            path,
            timeout: Duration::from_secs(30),
            body,
            envelope: ResponseEnvelope::Raw,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_envelope(mut self, envelope: ResponseEnvelope) -> Self {
        self.envelope = envelope;
        self
    }

    pub fn url(&self, hr: &HrApiConfig) -> String {
        format!("{}{}", hr.base_url, self.path)
    }

    /// API keys this binding reads at call time.
    pub fn api_keys(&self) -> Vec<ApiKey> {
        fn collect(fields: &[BodyField], out: &mut Vec<ApiKey>) {
            for f in fields {
                match &f.value {
                    ValueRule::ApiKey(k) => out.push(*k),
                    ValueRule::Records(nested) => collect(nested, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        collect(&self.body, &mut out);
        out
    }
}

/// A capability exposed to the hosted model: schema for the model, HTTP
/// binding for the runtime.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<Param>,
    pub binding: HttpBinding,
}

impl ToolDefinition {
    /// Function declaration shown to the model.
    pub fn schema(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.params {
            let mut prop = p.kind.schema();
            prop["description"] = Value::String(p.description.to_string());
            if let Some(ref d) = p.default {
                prop["default"] = d.clone();
            }
            properties.insert(p.name.to_string(), prop);
        }
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        })
    }

    /// Schema plus the runtime HTTP binding against the configured HR API.
    pub fn manifest(&self, hr: &HrApiConfig) -> Value {
        let mut entry = self.schema();
        entry["http"] = json!({
            "method": "POST",
            "url": self.binding.url(hr),
            "timeout_secs": self.binding.timeout.as_secs(),
            "auth": {
                "type": "basic",
                "username_env": DARWINBOX_USERNAME,
                "password_env": DARWINBOX_PASSWORD,
            },
            "body": fields_manifest(&self.binding.body),
            "response": self.binding.envelope.as_str(),
        });
        entry
    }

    /// Every declared parameter must reach the body, and the body may only
    /// read declared parameters.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let declared: BTreeSet<&str> = self.params.iter().map(|p| p.name).collect();

        let mut used = BTreeSet::new();
        for field in &self.binding.body {
            let mut refs = Vec::new();
            field.value.params(&mut refs);
            for param in refs {
                if !declared.contains(param) {
                    return Err(DefinitionError::UnknownParameter {
                        tool: self.name.to_string(),
                        field: field.name.to_string(),
                        param: param.to_string(),
                    });
                }
                used.insert(param);
            }
        }

        if let Some(unused) = declared.difference(&used).next() {
            return Err(DefinitionError::UnusedParameter {
                tool: self.name.to_string(),
                param: unused.to_string(),
            });
        }
        Ok(())
    }

    /// Build the request body the runtime would send for `input`. API keys
    /// appear as `${ENV_NAME}` placeholders. No request is made.
    pub fn render_body(&self, input: &Value, today: NaiveDate) -> Result<Value, ToolError> {
        let mut values = Map::new();
        for p in &self.params {
            match input.get(p.name).filter(|v| !v.is_null()) {
                Some(v) => {
                    values.insert(p.name.to_string(), v.clone());
                }
                None if p.required => return Err(ToolError::MissingArgument(p.name.into())),
                None => {
                    if let Some(ref d) = p.default {
                        values.insert(p.name.to_string(), d.clone());
                    }
                }
            }
        }
        render_fields(&self.binding.body, &Args { values, today })
    }
}

struct Args {
    values: Map<String, Value>,
    today: NaiveDate,
}

impl Args {
    fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    fn string(&self, name: &str) -> Result<String, ToolError> {
        match self.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(_) => Err(invalid(name, "expected a string")),
            None => Err(ToolError::MissingArgument(name.into())),
        }
    }

    fn list(&self, name: &str) -> Result<Vec<String>, ToolError> {
        match self.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s.clone()),
                    Value::Number(n) => Ok(n.to_string()),
                    _ => Err(invalid(name, "expected a list of strings")),
                })
                .collect(),
            Some(_) => Err(invalid(name, "expected a list of strings")),
            None => Err(ToolError::MissingArgument(name.into())),
        }
    }

    fn flag(&self, name: &str) -> Result<bool, ToolError> {
        match self.get(name) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(invalid(name, "expected a boolean")),
            None => Err(ToolError::MissingArgument(name.into())),
        }
    }
}

fn invalid(name: &str, reason: &str) -> ToolError {
    ToolError::InvalidArgument {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn non_empty(name: &str, value: String) -> Result<String, ToolError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid(name, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn parse_date(name: &str, value: &str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| invalid(name, "must be in YYYY-MM-DD format"))
}

fn capitalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 6).unwrap()
    }

    fn report_tool() -> ToolDefinition {
        ToolDefinition {
            name: "report",
            description: "Leave report",
            params: vec![
                Param::required("employee_no", ParamType::String, "Employee number"),
                Param::required("start_date", ParamType::String, "YYYY-MM-DD"),
                Param::optional("note", ParamType::String, "Note").with_default(json!("")),
            ],
            binding: HttpBinding::post(
                "/report",
                vec![
                    BodyField::new("api_key", ValueRule::ApiKey(ApiKey::LeaveReport)),
                    BodyField::new("employee_no", ValueRule::Wrapped("employee_no")),
                    BodyField::new("from", ValueRule::DayFirst("start_date")),
                    BodyField::new("note", ValueRule::Param("note")),
                    BodyField::new("action", ValueRule::Const("2")),
                ],
            ),
        }
    }

    #[test]
    fn schema_lists_required_params() {
        let schema = report_tool().schema();
        assert_eq!(schema["name"], "report");
        assert_eq!(schema["parameters"]["required"], json!(["employee_no", "start_date"]));
        assert_eq!(schema["parameters"]["properties"]["note"]["default"], "");
        assert_eq!(schema["parameters"]["properties"]["employee_no"]["type"], "string");
    }

    #[test]
    fn render_converts_and_wraps() {
        let body = report_tool()
            .render_body(
                &json!({"employee_no": " E42 ", "start_date": "2025-10-01"}),
                today(),
            )
            .unwrap();
        assert_eq!(
            body,
            json!({
                "api_key": "${LEAVE_REPORT_KEY}",
                "employee_no": ["E42"],
                "from": "01-10-2025",
                "note": "",
                "action": "2",
            })
        );
    }

    #[test]
    fn render_rejects_bad_date() {
        let err = report_tool()
            .render_body(
                &json!({"employee_no": "E42", "start_date": "01/10/2025"}),
                today(),
            )
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { ref name, .. } if name == "start_date"));
    }

    #[test]
    fn render_requires_required_params() {
        let err = report_tool()
            .render_body(&json!({"start_date": "2025-10-01"}), today())
            .unwrap_err();
        assert_eq!(err, ToolError::MissingArgument("employee_no".into()));
    }

    #[test]
    fn render_rejects_blank_employee() {
        let err = report_tool()
            .render_body(&json!({"employee_no": "  ", "start_date": "2025-10-01"}), today())
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgument { ref name, .. } if name == "employee_no"));
    }

    #[test]
    fn validate_catches_unused_param() {
        let mut tool = report_tool();
        tool.params
            .push(Param::optional("extra", ParamType::Boolean, "unused"));
        assert_eq!(
            tool.validate(),
            Err(DefinitionError::UnusedParameter {
                tool: "report".into(),
                param: "extra".into(),
            })
        );
    }

    #[test]
    fn validate_catches_unknown_param() {
        let mut tool = report_tool();
        tool.binding
            .body
            .push(BodyField::new("to", ValueRule::DayFirst("end_date")));
        assert_eq!(
            tool.validate(),
            Err(DefinitionError::UnknownParameter {
                tool: "report".into(),
                field: "to".into(),
                param: "end_date".into(),
            })
        );
    }

    #[test]
    fn capitalize_normalizes_case() {
        assert_eq!(capitalize("approved"), "Approved");
        assert_eq!(capitalize("REVOKED"), "Revoked");
        assert_eq!(capitalize(""), "");
    }
}
