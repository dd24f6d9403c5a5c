// 🏷️ Anomaly Rules - Rules as Data
// Heuristic consistency checks over a reconciled facility record
//
// Each rule is evaluated independently; a record can trip any subset.
// Adding or removing a rule never touches merge or scoring logic.

use crate::entities::Facility;

// ============================================================================
// RULE DEFINITION
// ============================================================================

/// Pre-computed views of a facility shared by every rule
pub struct RuleContext<'a> {
    pub facility: &'a Facility,

    /// Lower-cased facility type ("" when unknown)
    pub facility_type: String,

    pub capability_text: String,
    pub procedure_text: String,
    pub equipment_text: String,
}

impl<'a> RuleContext<'a> {
    pub fn new(facility: &'a Facility) -> Self {
        let join = |items: &[String]| items.join(" ").to_lowercase();

        RuleContext {
            facility,
            // Case-insensitive, like `Facility::is_type`
            facility_type: facility
                .facility_type
                .as_deref()
                .unwrap_or("")
                .trim()
                .to_lowercase(),
            capability_text: join(&facility.capabilities),
            procedure_text: join(&facility.procedures),
            equipment_text: join(&facility.equipment),
        }
    }
}

#[derive(Clone)]
pub struct AnomalyRule {
    /// Rule ID for tracking
    pub id: &'static str,

    /// Fires when this returns true
    pub predicate: fn(&RuleContext) -> bool,

    /// Message appended to the record; supports `{specialty_count}`,
    /// `{procedure_count}` and `{facility_type}` placeholders
    pub message: &'static str,
}

impl AnomalyRule {
    /// Rendered message if the rule fires
    pub fn check(&self, ctx: &RuleContext) -> Option<String> {
        if (self.predicate)(ctx) {
            Some(self.render(ctx))
        } else {
            None
        }
    }

    fn render(&self, ctx: &RuleContext) -> String {
        self.message
            .replace("{specialty_count}", &ctx.facility.specialties.len().to_string())
            .replace("{procedure_count}", &ctx.facility.procedures.len().to_string())
            .replace("{facility_type}", &ctx.facility_type)
    }
}

// ============================================================================
// BUILT-IN RULES
// ============================================================================

/// Equipment keywords that back an imaging claim
const IMAGING_EQUIPMENT_KEYWORDS: [&str; 3] = ["mri", "ct ", "scanner"];

fn clinic_claims_surgery(ctx: &RuleContext) -> bool {
    ctx.facility_type == "clinic"
        && (ctx.capability_text.contains("surgery")
            || ctx.capability_text.contains("surgical")
            || ctx.procedure_text.contains("surgical"))
}

fn imaging_without_equipment(ctx: &RuleContext) -> bool {
    let claims_imaging =
        ctx.capability_text.contains("mri") || ctx.capability_text.contains("ct scan");

    // Missing equipment data alone is not evidence of a mismatch
    claims_imaging
        && !ctx.equipment_text.is_empty()
        && !IMAGING_EQUIPMENT_KEYWORDS
            .iter()
            .any(|kw| ctx.equipment_text.contains(kw))
}

fn specialty_count_too_high(ctx: &RuleContext) -> bool {
    ctx.facility.specialties.len() > 8
        && (ctx.facility_type == "clinic" || ctx.facility_type == "dentist")
}

fn procedures_without_equipment(ctx: &RuleContext) -> bool {
    ctx.facility.procedures.len() > 5 && ctx.facility.equipment.is_empty()
}

/// Default rule table, in evaluation order
pub fn default_rules() -> Vec<AnomalyRule> {
    vec![
        AnomalyRule {
            id: "clinic_surgical_claim",
            predicate: clinic_claims_surgery,
            message: "Clinic claims surgical capabilities - verify",
        },
        AnomalyRule {
            id: "imaging_without_equipment",
            predicate: imaging_without_equipment,
            message: "Claims imaging capability but no imaging equipment listed",
        },
        AnomalyRule {
            id: "high_specialty_count",
            predicate: specialty_count_too_high,
            message: "Unusually high specialty count ({specialty_count}) for {facility_type}",
        },
        AnomalyRule {
            id: "procedures_without_equipment",
            predicate: procedures_without_equipment,
            message: "Multiple procedures listed but no equipment data",
        },
    ]
}

// ============================================================================
// RULE ENGINE
// ============================================================================

pub struct AnomalyDetector {
    rules: Vec<AnomalyRule>,
}

impl AnomalyDetector {
    /// Detector with the default rule table
    pub fn new() -> Self {
        AnomalyDetector::from_rules(default_rules())
    }

    pub fn from_rules(rules: Vec<AnomalyRule>) -> Self {
        AnomalyDetector { rules }
    }

    pub fn add_rule(&mut self, rule: AnomalyRule) {
        self.rules.push(rule);
    }

    /// Messages of every rule that fires, in table order
    pub fn detect(&self, facility: &Facility) -> Vec<String> {
        let ctx = RuleContext::new(facility);
        self.rules.iter().filter_map(|rule| rule.check(&ctx)).collect()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
