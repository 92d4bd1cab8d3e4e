// 📏 Unit Resolver - unit strings → openLCA unit / flow property refs
//
// Every unit string in an exchange table must resolve before anything is built.
// Failures are collected and reported together, so a table with five typos
// costs one fix cycle instead of five.

use crate::entities::{ModelType, Ref};
use crate::errors::{PipelineError, PipelineResult};
use crate::identity::uuid_of_parts;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Resolves unit strings to references (collaborator seam)
pub trait UnitResolver {
    fn unit_ref(&self, unit: &str) -> Option<Ref>;

    fn property_ref(&self, unit: &str) -> Option<Ref>;
}

// ============================================================================
// UNIT TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UnitDefinition {
    pub unit: String,
    pub unit_id: String,
    pub property: String,
    pub property_id: String,
}

impl UnitDefinition {
    fn new(unit: &str, unit_id: &str, property: &str, property_id: &str) -> Self {
        UnitDefinition {
            unit: unit.to_string(),
            unit_id: unit_id.to_string(),
            property: property.to_string(),
            property_id: property_id.to_string(),
        }
    }
}

/// Unit lookup table with aliases
pub struct UnitTable {
    units: HashMap<String, UnitDefinition>,
    aliases: HashMap<String, String>,
}

const MASS: &str = "93a60a56-a3c8-11da-a746-0800200b9a66";
const ENERGY: &str = "f6811440-ee37-11de-8a39-0800200c9a66";
const VOLUME: &str = "93a60a56-a3c8-22da-a746-0800200b9a66";
const AREA: &str = "93a60a56-a3c8-19da-a746-0800200b9a66";
const ITEMS: &str = "01846770-4cfe-4a25-8ad9-919d8d378345";
const LENGTH: &str = "838aaa23-0117-11db-92e3-0800200c9a66";
const GOODS_TRANSPORT: &str = "838aaa21-0117-11db-92e3-0800200c9a66";

/// Units with fixed openLCA ids: (unit, unit id, property, property id)
const FIXED_ID_UNITS: &[(&str, &str, &str, &str)] = &[
    ("kg", "20aadc24-a391-41cf-b340-3e4529f44bde", "Mass", MASS),
    ("MJ", "52765a6c-3896-43c2-b2f4-c679acf13efe", "Energy", ENERGY),
    ("kWh", "86ad2244-1f0e-4912-af53-7865283103e4", "Energy", ENERGY),
    ("m3", "1c3a9695-398d-4b1f-b07e-a8715b610f70", "Volume", VOLUME),
    ("m2", "3ce61faa-5716-41c1-aef6-b5da6b3a1e0d", "Area", AREA),
    ("Item(s)", "5beb6eed-33a9-47b8-9ede-1dfe8f679159", "Number of items", ITEMS),
];

/// Further units of the same quantities: (unit, property, property id)
const DERIVED_UNITS: &[(&str, &str, &str)] = &[
    ("g", "Mass", MASS),
    ("mg", "Mass", MASS),
    ("t", "Mass", MASS),
    ("lb", "Mass", MASS),
    ("MWh", "Energy", ENERGY),
    ("GJ", "Energy", ENERGY),
    ("TJ", "Energy", ENERGY),
    ("btu", "Energy", ENERGY),
    ("L", "Volume", VOLUME),
    ("gal*", "Volume", VOLUME),
    ("ft3", "Volume", VOLUME),
    ("ha", "Area", AREA),
    ("m", "Length", LENGTH),
    ("km", "Length", LENGTH),
    ("mi", "Length", LENGTH),
    ("t*km", "Goods transport (mass*distance)", GOODS_TRANSPORT),
    ("kg*km", "Goods transport (mass*distance)", GOODS_TRANSPORT),
    ("t*mi", "Goods transport (mass*distance)", GOODS_TRANSPORT),
];

const BUILT_IN_ALIASES: &[(&str, &str)] = &[
    ("metric ton", "t"),
    ("tonne", "t"),
    ("l", "L"),
    ("tkm", "t*km"),
    ("gal", "gal*"),
];

impl UnitTable {
    /// Table with the openLCA units of the common quantities
    pub fn new() -> Self {
        let mut table = UnitTable::empty();
        table.register_reference_units();
        table
    }

    /// Table with no units (aliases still registered)
    pub fn empty() -> Self {
        let aliases = BUILT_IN_ALIASES
            .iter()
            .map(|(alias, unit)| (alias.to_string(), unit.to_string()))
            .collect();

        UnitTable {
            units: HashMap::new(),
            aliases,
        }
    }

    // Units without a fixed id get a name-derived one; a units CSV registered later
    // replaces them with the ids of a specific reference database.
    fn register_reference_units(&mut self) {
        for (unit, unit_id, property, property_id) in FIXED_ID_UNITS {
            self.register(UnitDefinition::new(unit, unit_id, property, property_id));
        }
        for (unit, property, property_id) in DERIVED_UNITS {
            let unit_id = uuid_of_parts(&["unit", *property, *unit]);
            self.register(UnitDefinition::new(unit, &unit_id, property, property_id));
        }
    }

    /// Extend the table from a CSV with columns `unit, unit_id, property, property_id`
    pub fn extend_from_csv(&mut self, path: &Path) -> PipelineResult<usize> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut added = 0;
        for result in rdr.deserialize() {
            let definition: UnitDefinition = result?;
            self.register(definition);
            added += 1;
        }
        Ok(added)
    }

    pub fn register(&mut self, definition: UnitDefinition) {
        self.units.insert(definition.unit.clone(), definition);
    }

    pub fn add_alias(&mut self, alias: impl Into<String>, unit: impl Into<String>) {
        self.aliases.insert(alias.into(), unit.into());
    }

    pub fn get(&self, unit: &str) -> Option<&UnitDefinition> {
        let key = unit.trim();
        let key = self.aliases.get(key).map(String::as_str).unwrap_or(key);
        self.units.get(key)
    }

    pub fn count(&self) -> usize {
        self.units.len()
    }
}

impl Default for UnitTable {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitResolver for UnitTable {
    fn unit_ref(&self, unit: &str) -> Option<Ref> {
        self.get(unit)
            .map(|d| Ref::new(ModelType::Unit, &d.unit_id, &d.unit))
    }

    fn property_ref(&self, unit: &str) -> Option<Ref> {
        self.get(unit)
            .map(|d| Ref::new(ModelType::FlowProperty, &d.property_id, &d.property))
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Check every distinct unit; report all failures in one error
pub fn validate_units<'a, I>(units: I, resolver: &dyn UnitResolver) -> PipelineResult<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let distinct: BTreeSet<&str> = units.into_iter().collect();
    let unresolved: Vec<String> = distinct
        .into_iter()
        .filter(|u| resolver.unit_ref(u).is_none())
        .map(str::to_string)
        .collect();

    if unresolved.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::UnresolvedUnits(unresolved))
    }
}

/// Round to `sig_figs` significant figures (0 stays 0)
pub fn round_to_sig_figs(number: f64, sig_figs: u32) -> f64 {
    if number == 0.0 || !number.is_finite() {
        return number;
    }
    let magnitude = number.abs().log10().floor() as i32;
    let decimals = sig_figs as i32 - 1 - magnitude;
    if decimals >= 0 {
        let factor = 10f64.powi(decimals);
        (number * factor).round() / factor
    } else {
        // divide first so the scale stays an exact integer
        let factor = 10f64.powi(-decimals);
        (number / factor).round() * factor
    }
}
