//! Constraint engine: schema-attached validation rules
//!
//! One `ConstraintsManager` per schema, optionally chained to a parent
//! schema's manager for shared/base schemas. Constraints are evaluated
//! automatically at commit (`Check`) or on demand (`Validate`, which
//! includes `Check`-kind constraints). Evaluation accumulates diagnostics
//! rather than short-circuiting, walking the target element's inheritance
//! chain from the element itself up to (but excluding) the Primitive root.
//!
//! Evaluators return `Result<bool, String>`: the `Err` arm is the caught
//! evaluator fault, downgraded to an Error diagnostic quoting the original
//! message, never aborting the whole pass.

use std::collections::HashMap;
use std::fmt;

use modelgraph_core_types::{ElementId, SchemaElementId};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::DomainModel;
use crate::model::{ModelElement, SchemaKind};
use crate::store::Store;

/// When a constraint runs
///
/// Ordering matters: a constraint applies when `constraint.kind <=
/// requested`, so Check-kind constraints also run under a Validate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Runs on every commit
    Check,
    /// Runs only on demand
    Validate,
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// One validation finding, carrying its target element and property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticMessage {
    pub severity: Severity,
    pub message: String,
    pub element_id: Option<ElementId>,
    pub property: Option<String>,
}

impl DiagnosticMessage {
    pub fn new(
        severity: Severity,
        message: impl Into<String>,
        element_id: Option<ElementId>,
        property: Option<String>,
    ) -> Self {
        Self {
            severity,
            message: message.into(),
            element_id,
            property,
        }
    }

    /// Shorthand for an Error-severity message
    pub fn error(message: impl Into<String>, element_id: Option<ElementId>) -> Self {
        Self::new(Severity::Error, message, element_id, None)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Evaluation context handed to constraint evaluators
pub struct ConstraintContext<'a> {
    pub element: &'a ModelElement,
    pub domain: Option<&'a DomainModel>,
    /// Set for property-scoped constraints
    pub property_name: Option<&'a str>,
    /// Current value of the scoped property, if stored
    pub value: Option<&'a JsonValue>,
    /// Previous value of the scoped property, if any
    pub old_value: Option<&'a JsonValue>,
}

impl ConstraintContext<'_> {
    /// Look up any stored property value of the target element
    pub fn property(&self, name: &str) -> Option<&JsonValue> {
        self.domain
            .and_then(|d| d.property_value(&self.element.id, name))
            .map(|pv| &pv.value)
    }
}

/// Evaluator signature: `Ok(true)` passes, `Ok(false)` emits the message,
/// `Err` is a fault downgraded to an Error diagnostic
pub type ConstraintEvaluator = Box<dyn Fn(&ConstraintContext<'_>) -> Result<bool, String>>;

/// A schema-attached validation rule
pub struct Constraint {
    pub name: String,
    pub kind: ConstraintKind,
    pub severity: Severity,
    /// Message template; `{value}`, `{oldValue}`, `{propertyName}` resolve
    /// from context, `{field}` from the target element, `{$param}` from the
    /// constraint's own parameters
    pub message: String,
    /// Scope the constraint to one property, filling value/old_value in the
    /// context
    pub property: Option<String>,
    /// Parameters referenced as `{$name}` in the template
    pub parameters: HashMap<String, String>,
    evaluator: ConstraintEvaluator,
}

impl Constraint {
    pub fn new(
        name: &str,
        kind: ConstraintKind,
        severity: Severity,
        message: &str,
        evaluator: ConstraintEvaluator,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            severity,
            message: message.to_string(),
            property: None,
            parameters: HashMap::new(),
            evaluator,
        }
    }

    /// Scope the constraint to one property
    pub fn with_property(mut self, property: &str) -> Self {
        self.property = Some(property.to_string());
        self
    }

    /// Add a template parameter, referenced as `{$name}`
    pub fn with_parameter(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.parameters.insert(name.to_string(), value.to_string());
        self
    }

    /// Whether this constraint runs under the requested kind
    pub fn applies_under(&self, requested: ConstraintKind) -> bool {
        self.kind <= requested
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("severity", &self.severity)
            .field("property", &self.property)
            .finish()
    }
}

/// Registry of constraints for one schema
///
/// Optionally chained to a parent schema's manager; lookups fall through the
/// chain in order, so shared/base schemas contribute their constraints to
/// derived ones.
#[derive(Debug, Default)]
pub struct ConstraintsManager {
    parent: Option<String>,
    by_element: HashMap<SchemaElementId, Vec<Constraint>>,
}

impl ConstraintsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain this manager to a parent schema's manager
    pub fn set_parent(&mut self, parent_schema: &str) {
        self.parent = Some(parent_schema.to_string());
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Attach a constraint to a schema element, in registration order
    pub fn add(&mut self, element: &SchemaElementId, constraint: Constraint) {
        self.by_element
            .entry(element.clone())
            .or_default()
            .push(constraint);
    }

    /// Constraints registered locally for an element
    pub fn constraints_for(&self, element: &SchemaElementId) -> &[Constraint] {
        self.by_element
            .get(element)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn value_display(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve a message template against context, element fields, and
/// constraint parameters
///
/// Unresolvable tokens are kept literally.
fn render_message(constraint: &Constraint, ctx: &ConstraintContext<'_>) -> String {
    let template = &constraint.message;
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '{' {
            out.push(ch);
            continue;
        }
        let mut token = String::new();
        let mut closed = false;
        for inner in chars.by_ref() {
            if inner == '}' {
                closed = true;
                break;
            }
            token.push(inner);
        }
        if !closed {
            out.push('{');
            out.push_str(&token);
            break;
        }
        let resolved = match token.as_str() {
            "value" => ctx.value.map(value_display),
            "oldValue" => ctx.old_value.map(value_display),
            "propertyName" => ctx.property_name.map(str::to_string),
            "id" => Some(ctx.element.id.to_string()),
            "schemaId" => Some(ctx.element.schema_id.to_string()),
            "domain" => Some(ctx.element.id.domain().to_string()),
            "version" => Some(ctx.element.version.to_string()),
            name => {
                if let Some(param) = name.strip_prefix('$') {
                    constraint.parameters.get(param).cloned()
                } else {
                    ctx.property(name).map(value_display)
                }
            }
        };
        match resolved {
            Some(text) => out.push_str(&text),
            None => {
                out.push('{');
                out.push_str(&token);
                out.push('}');
            }
        }
    }
    out
}

fn evaluate_one(
    constraint: &Constraint,
    element: &ModelElement,
    domain: Option<&DomainModel>,
    out: &mut Vec<DiagnosticMessage>,
) {
    let stored = constraint.property.as_ref().and_then(|p| {
        domain
            .and_then(|d| d.property_value(&element.id, p))
            .cloned()
    });
    let ctx = ConstraintContext {
        element,
        domain,
        property_name: constraint.property.as_deref(),
        value: stored.as_ref().map(|pv| &pv.value),
        old_value: stored.as_ref().and_then(|pv| pv.old_value.as_ref()),
    };
    match (constraint.evaluator)(&ctx) {
        Ok(true) => {}
        Ok(false) => out.push(DiagnosticMessage::new(
            constraint.severity,
            render_message(constraint, &ctx),
            Some(element.id.clone()),
            constraint.property.clone(),
        )),
        Err(fault) => out.push(DiagnosticMessage::new(
            Severity::Error,
            format!("constraint '{}' failed to evaluate: {fault}", constraint.name),
            Some(element.id.clone()),
            constraint.property.clone(),
        )),
    }
}

/// Evaluate all applicable constraints for one element
///
/// Order: own schema element's constraints in registration order (falling
/// through the manager parent chain), then each ancestor's up the
/// inheritance chain, excluding the Primitive root. Diagnostics accumulate;
/// nothing short-circuits.
pub(crate) fn evaluate(
    store: &Store,
    element: &ModelElement,
    requested: ConstraintKind,
) -> Vec<DiagnosticMessage> {
    let mut out = Vec::new();
    let Some(schema) = store.schema(element.schema_id.schema()) else {
        return out;
    };
    let domain = store.domain(element.id.domain());

    for ancestor in schema.base_chain(&element.schema_id) {
        if schema
            .element(ancestor)
            .map_or(true, |el| el.kind == SchemaKind::Primitive)
        {
            continue;
        }
        // Walk the manager chain: the element's own schema first, then
        // parent managers, guarding against chain loops
        let mut current = Some(schema.name());
        let mut seen: Vec<&str> = Vec::new();
        while let Some(name) = current {
            if seen.contains(&name) {
                break;
            }
            seen.push(name);
            let Some(s) = store.schema(name) else { break };
            for constraint in s.constraints().constraints_for(ancestor) {
                if constraint.applies_under(requested) {
                    evaluate_one(constraint, element, domain, &mut out);
                }
            }
            current = s.constraints().parent();
        }
    }
    out
}
