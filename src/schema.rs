// 📐 Shape Layer - Exchange + mapping table schemas
// Validates tabular input before any entity is built

use crate::entities::FlowType;
use crate::errors::{PipelineError, PipelineResult};
use crate::units::{validate_units, UnitResolver};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// COLUMN SCHEMA
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Str,
    Bool,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Must be present and non-null on load
    Required,
    /// May be filled in by tech flow mapping; non-null once validated
    RequiredAfterMapping,
    Optional,
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub dtype: ColumnType,
    pub requirement: Requirement,
}

const fn col(name: &'static str, dtype: ColumnType, requirement: Requirement) -> ColumnSpec {
    ColumnSpec {
        name,
        dtype,
        requirement,
    }
}

/// Exchange table columns, in canonical order
pub const EXCHANGE_SCHEMA: &[ColumnSpec] = &[
    col("ProcessID", ColumnType::Str, Requirement::Optional),
    col("ProcessCategory", ColumnType::Str, Requirement::Required),
    col("ProcessName", ColumnType::Str, Requirement::Required),
    col("FlowUUID", ColumnType::Str, Requirement::RequiredAfterMapping),
    col("FlowName", ColumnType::Str, Requirement::Required),
    col("Context", ColumnType::Str, Requirement::Required),
    col("IsInput", ColumnType::Bool, Requirement::Required),
    col("FlowType", ColumnType::Str, Requirement::Required),
    col("reference", ColumnType::Bool, Requirement::Required),
    col("default_provider", ColumnType::Str, Requirement::Optional),
    col("description", ColumnType::Str, Requirement::Optional),
    col("amount", ColumnType::Float, Requirement::Required),
    col("unit", ColumnType::Str, Requirement::Required),
    col("avoided_product", ColumnType::Bool, Requirement::Optional),
    col("exchange_dqi", ColumnType::Str, Requirement::Optional),
];

// ============================================================================
// EXCHANGE ROW
// ============================================================================

/// Set on rows whose flow was routed through a bridge process
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeLink {
    /// Flow name the row carried before mapping (mapping key)
    pub source_flow_name: String,
    pub target_repo: Option<String>,
}

/// One exchange record
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRow {
    pub process_id: Option<String>,
    pub process_category: String,
    pub process_name: String,
    pub flow_uuid: Option<String>,
    pub flow_name: String,
    pub context: String,
    pub is_input: bool,
    pub flow_type: FlowType,
    pub reference: bool,
    pub default_provider: Option<String>,
    pub default_provider_process: Option<String>,
    pub description: Option<String>,
    pub amount: f64,
    pub unit: String,
    pub avoided_product: Option<bool>,
    pub exchange_dqi: Option<String>,
    pub location: Option<String>,
    pub tags: Vec<String>,
    pub bridge: Option<BridgeLink>,
}

impl ExchangeRow {
    pub fn new(
        process_name: impl Into<String>,
        flow_name: impl Into<String>,
        flow_type: FlowType,
        amount: f64,
        unit: impl Into<String>,
    ) -> Self {
        ExchangeRow {
            process_id: None,
            process_category: String::new(),
            process_name: process_name.into(),
            flow_uuid: None,
            flow_name: flow_name.into(),
            context: String::new(),
            is_input: false,
            flow_type,
            reference: false,
            default_provider: None,
            default_provider_process: None,
            description: None,
            amount,
            unit: unit.into(),
            avoided_product: None,
            exchange_dqi: None,
            location: None,
            tags: Vec::new(),
            bridge: None,
        }
    }

    /// Builder: mark as input
    pub fn as_input(mut self) -> Self {
        self.is_input = true;
        self
    }

    /// Builder: mark as quantitative reference
    pub fn as_reference(mut self) -> Self {
        self.reference = true;
        self
    }

    pub fn with_flow_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.flow_uuid = Some(uuid.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.process_category = category.into();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn is_bridged(&self) -> bool {
        self.bridge.is_some()
    }
}

// ============================================================================
// RAW ROW (lenient CSV shape)
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct RawExchangeRow {
    #[serde(rename = "ProcessID", default)]
    process_id: Option<String>,
    #[serde(rename = "ProcessCategory", default)]
    process_category: Option<String>,
    #[serde(rename = "ProcessName", default)]
    process_name: Option<String>,
    #[serde(rename = "FlowUUID", default)]
    flow_uuid: Option<String>,
    #[serde(rename = "FlowName", default)]
    flow_name: Option<String>,
    #[serde(rename = "Context", default)]
    context: Option<String>,
    #[serde(rename = "IsInput", default)]
    is_input: Option<String>,
    #[serde(rename = "FlowType", default)]
    flow_type: Option<String>,
    #[serde(rename = "reference", default)]
    reference: Option<String>,
    #[serde(rename = "default_provider", default)]
    default_provider: Option<String>,
    #[serde(rename = "default_provider_process", default)]
    default_provider_process: Option<String>,
    #[serde(rename = "description", default)]
    description: Option<String>,
    #[serde(rename = "amount", default)]
    amount: Option<String>,
    #[serde(rename = "unit", default)]
    unit: Option<String>,
    #[serde(rename = "avoided_product", default)]
    avoided_product: Option<String>,
    #[serde(rename = "exchange_dqi", default)]
    exchange_dqi: Option<String>,
    #[serde(rename = "location", default)]
    location: Option<String>,
    #[serde(rename = "Tag", default)]
    tag: Option<String>,
}

impl RawExchangeRow {
    fn value(&self, column: &str) -> Option<&str> {
        let v = match column {
            "ProcessID" => &self.process_id,
            "ProcessCategory" => &self.process_category,
            "ProcessName" => &self.process_name,
            "FlowUUID" => &self.flow_uuid,
            "FlowName" => &self.flow_name,
            "Context" => &self.context,
            "IsInput" => &self.is_input,
            "FlowType" => &self.flow_type,
            "reference" => &self.reference,
            "default_provider" => &self.default_provider,
            "description" => &self.description,
            "amount" => &self.amount,
            "unit" => &self.unit,
            "avoided_product" => &self.avoided_product,
            "exchange_dqi" => &self.exchange_dqi,
            _ => return None,
        };
        non_blank(v.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn owned(value: Option<&str>) -> Option<String> {
    non_blank(value).map(str::to_string)
}

/// Parse spreadsheet-style booleans
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "1.0" | "yes" | "y" => Some(true),
        "false" | "0" | "0.0" | "no" | "n" => Some(false),
        _ => None,
    }
}

// ============================================================================
// EXCHANGE TABLE
// ============================================================================

pub struct ExchangeTable;

impl ExchangeTable {
    /// Load an exchange CSV, validating shape (columns, nulls, types)
    pub fn from_csv(path: &Path) -> PipelineResult<Vec<ExchangeRow>> {
        let mut rdr = csv::Reader::from_path(path)?;
        Self::from_reader(&mut rdr)
    }

    pub fn from_reader<R: std::io::Read>(rdr: &mut csv::Reader<R>) -> PipelineResult<Vec<ExchangeRow>> {
        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
        check_required_columns(&headers)?;

        let mut raw_rows = Vec::new();
        for result in rdr.deserialize() {
            let raw: RawExchangeRow = result?;
            raw_rows.push(raw);
        }

        check_required_values(&raw_rows, Requirement::Required)?;

        let mut rows = Vec::with_capacity(raw_rows.len());
        let mut errors = Vec::new();
        for (i, raw) in raw_rows.iter().enumerate() {
            match convert_row(raw) {
                Ok(row) => rows.push(row),
                Err(mut e) => {
                    // data rows start on line 2
                    e.iter_mut().for_each(|m| *m = format!("row {}: {}", i + 2, m));
                    errors.extend(e);
                }
            }
        }

        if errors.is_empty() {
            Ok(rows)
        } else {
            Err(PipelineError::Validation(errors))
        }
    }
}

fn check_required_columns(headers: &[String]) -> PipelineResult<()> {
    let missing: Vec<String> = EXCHANGE_SCHEMA
        .iter()
        .filter(|c| c.requirement == Requirement::Required)
        .filter(|c| !headers.iter().any(|h| h == c.name))
        .map(|c| format!("Missing required column {}", c.name))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Validation(missing))
    }
}

fn check_required_values(rows: &[RawExchangeRow], level: Requirement) -> PipelineResult<()> {
    let errors: Vec<String> = EXCHANGE_SCHEMA
        .iter()
        .filter(|c| c.requirement == level)
        .filter(|c| rows.iter().any(|r| r.value(c.name).is_none()))
        .map(|c| format!("Missing data in {}", c.name))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Validation(errors))
    }
}

fn convert_row(raw: &RawExchangeRow) -> Result<ExchangeRow, Vec<String>> {
    let mut errors = Vec::new();

    let mut flag = |column: &str| -> bool {
        match raw.value(column) {
            None => false,
            Some(v) => parse_flag(v).unwrap_or_else(|| {
                errors.push(format!("{} `{}` is not a boolean", column, v));
                false
            }),
        }
    };
    let is_input = flag("IsInput");
    let reference = flag("reference");
    let avoided_product = raw.value("avoided_product").map(|_| flag("avoided_product"));

    let flow_type = match raw.value("FlowType").unwrap_or("").parse::<FlowType>() {
        Ok(t) => Some(t),
        Err(e) => {
            errors.push(e);
            None
        }
    };

    let amount_str = raw.value("amount").unwrap_or("");
    let amount = match amount_str.parse::<f64>() {
        Ok(a) => a,
        Err(_) => {
            errors.push(format!("amount `{}` is not a number", amount_str));
            0.0
        }
    };

    let flow_type = match flow_type {
        Some(t) if errors.is_empty() => t,
        _ => return Err(errors),
    };

    Ok(ExchangeRow {
        process_id: owned(raw.process_id.as_deref()),
        process_category: raw.value("ProcessCategory").unwrap_or("").to_string(),
        process_name: raw.value("ProcessName").unwrap_or("").to_string(),
        flow_uuid: owned(raw.flow_uuid.as_deref()),
        flow_name: raw.value("FlowName").unwrap_or("").to_string(),
        context: raw.value("Context").unwrap_or("").to_string(),
        is_input,
        flow_type,
        reference,
        default_provider: owned(raw.default_provider.as_deref()),
        default_provider_process: owned(raw.default_provider_process.as_deref()),
        description: owned(raw.description.as_deref()),
        amount,
        unit: raw.value("unit").unwrap_or("").to_string(),
        avoided_product,
        exchange_dqi: owned(raw.exchange_dqi.as_deref()),
        location: owned(raw.location.as_deref()),
        tags: owned(raw.tag.as_deref()).into_iter().collect(),
        bridge: None,
    })
}

/// Final check before building flows / processes:
/// every FlowUUID is set and every unit resolves (all bad units reported together)
pub fn validate_exchange_data(rows: &[ExchangeRow], units: &dyn UnitResolver) -> PipelineResult<()> {
    if rows.iter().any(|r| non_blank(r.flow_uuid.as_deref()).is_none()) {
        return Err(PipelineError::invalid("Missing data in FlowUUID"));
    }
    validate_units(rows.iter().map(|r| r.unit.as_str()), units)
}

// ============================================================================
// MAPPING SPEC TABLE
// ============================================================================

/// One row of the technosphere flow mapping file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MappingSpecRow {
    #[serde(rename = "SourceFlowName")]
    pub source_flow_name: String,

    #[serde(rename = "Bridge", default)]
    pub bridge: Option<String>,

    #[serde(rename = "BridgeFlowName", default)]
    pub bridge_flow_name: Option<String>,

    #[serde(rename = "TargetFlowName")]
    pub target_flow_name: String,

    #[serde(rename = "Provider", default)]
    pub provider: Option<String>,

    #[serde(rename = "TargetRepoName", default)]
    pub target_repo_name: Option<String>,

    #[serde(rename = "ConversionFactor", default)]
    pub conversion_factor: Option<f64>,

    #[serde(rename = "TargetUnit", default)]
    pub target_unit: Option<String>,
}

impl MappingSpecRow {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        MappingSpecRow {
            source_flow_name: source.into(),
            bridge: None,
            bridge_flow_name: None,
            target_flow_name: target.into(),
            provider: None,
            target_repo_name: None,
            conversion_factor: None,
            target_unit: None,
        }
    }

    /// Truthy `Bridge` column (absent / blank / unparseable → false)
    pub fn is_bridge(&self) -> bool {
        non_blank(self.bridge.as_deref())
            .and_then(parse_flag)
            .unwrap_or(false)
    }
}

pub struct MappingTable;

impl MappingTable {
    pub fn from_csv(path: &Path) -> PipelineResult<Vec<MappingSpecRow>> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut rows = Vec::new();
        for result in rdr.deserialize() {
            let row: MappingSpecRow = result?;
            rows.push(row);
        }
        Ok(rows)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::UnitTable;

    const HEADER: &str = "ProcessCategory,ProcessName,FlowUUID,FlowName,Context,IsInput,FlowType,reference,amount,unit";

    fn read(csv_text: &str) -> PipelineResult<Vec<ExchangeRow>> {
        let mut rdr = csv::Reader::from_reader(csv_text.as_bytes());
        ExchangeTable::from_reader(&mut rdr)
    }

    #[test]
    fn test_load_valid_table() {
        let text = format!(
            "{HEADER},location,Tag\n\
             Energy/Coal,Coal extraction,u1,Coal,Technosphere Flows,False,PRODUCT_FLOW,True,1.0,kg,US,USLCI\n\
             Energy/Coal,Coal extraction,u2,Methane,air,False,ELEMENTARY_FLOW,False,0.02,kg,US,\n"
        );
        let rows = read(&text).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].reference);
        assert!(!rows[0].is_input);
        assert_eq!(rows[0].flow_type, FlowType::ProductFlow);
        assert_eq!(rows[0].location.as_deref(), Some("US"));
        assert_eq!(rows[0].tags, vec!["USLCI".to_string()]);
        assert!(rows[1].tags.is_empty());
        assert_eq!(rows[1].amount, 0.02);
    }

    #[test]
    fn test_missing_columns_reported_together() {
        let text = "ProcessCategory,ProcessName,FlowName\nA,B,C\n";
        let err = read(text).unwrap_err();
        match err {
            PipelineError::Validation(msgs) => {
                assert!(msgs.iter().any(|m| m.contains("Context")));
                assert!(msgs.iter().any(|m| m.contains("amount")));
                assert!(msgs.iter().any(|m| m.contains("unit")));
                // FlowUUID may be added by tech flow mapping
                assert!(!msgs.iter().any(|m| m.contains("FlowUUID")));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_null_in_required_field() {
        let text = format!("{HEADER}\nA,P,u1,F,C,False,PRODUCT_FLOW,True,,kg\n");
        let err = read(&text).unwrap_err();
        assert!(err.to_string().contains("Missing data in amount"));
    }

    #[test]
    fn test_unknown_flow_type_rejected() {
        let text = format!("{HEADER}\nA,P,u1,F,C,False,RESOURCE_FLOW,True,1,kg\n");
        let err = read(&text).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("row 2"));
        assert!(msg.contains("RESOURCE_FLOW"));
    }

    #[test]
    fn test_validate_exchange_data_batches_units() {
        let rows = vec![
            ExchangeRow::new("P", "A", FlowType::ProductFlow, 1.0, "kgg").with_flow_uuid("u1"),
            ExchangeRow::new("P", "B", FlowType::ProductFlow, 1.0, "MJJ").with_flow_uuid("u2"),
            ExchangeRow::new("P", "C", FlowType::ProductFlow, 1.0, "kg").with_flow_uuid("u3"),
        ];
        match validate_exchange_data(&rows, &UnitTable::new()).unwrap_err() {
            PipelineError::UnresolvedUnits(bad) => assert_eq!(bad, vec!["MJJ", "kgg"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_requires_flow_uuid() {
        let rows = vec![ExchangeRow::new("P", "A", FlowType::ProductFlow, 1.0, "kg")];
        let err = validate_exchange_data(&rows, &UnitTable::new()).unwrap_err();
        assert!(err.to_string().contains("FlowUUID"));
    }

    #[test]
    fn test_mapping_row_bridge_flag() {
        let text = "SourceFlowName,Bridge,BridgeFlowName,TargetFlowName,Provider,TargetRepoName,ConversionFactor,TargetUnit\n\
                    Diesel fuel,True,\"Diesel, combusted\",Diesel,,USLCI,0.85,kg\n\
                    Electricity,,,\"Electricity, AC\",Grid mix,US Electricity Baseline,,kWh\n";
        let mut rdr = csv::Reader::from_reader(text.as_bytes());
        let rows: Vec<MappingSpecRow> = rdr.deserialize().collect::<Result<_, _>>().unwrap();
        assert!(rows[0].is_bridge());
        assert_eq!(rows[0].bridge_flow_name.as_deref(), Some("Diesel, combusted"));
        assert_eq!(rows[0].conversion_factor, Some(0.85));
        assert!(!rows[1].is_bridge());
        assert_eq!(rows[1].conversion_factor, None);
        assert_eq!(rows[1].provider.as_deref(), Some("Grid mix"));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
