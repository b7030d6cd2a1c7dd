//! Validation of realized dependencies.

use rigging_common::validation::ValidationErrors;

use crate::graph::Binding;
use crate::host::Host;

/// Validates every realized dependency of `host`.
///
/// Each instance contributes its own [`Component::validate`] errors plus a
/// "can't be blank" error for every required bound attribute it lacks.
/// Errors are keyed `"<component>.<field>"`.
///
/// [`Component::validate`]: crate::component::Component::validate
#[must_use]
pub fn validate_dependencies(host: &Host) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    for (component, binding) in host.graph().bindings() {
        let found = validate_binding(binding);
        if !found.is_empty() {
            tracing::debug!(component, fields = found.len(), "dependency failed validation");
        }
        errors.merge_scoped(component, found);
    }
    errors
}

fn validate_binding(binding: &Binding) -> ValidationErrors {
    let instance = binding.instance().borrow();
    let mut errors = instance.validate();
    for attr in binding.option().attributes().iter().filter(|a| a.is_required()) {
        let blank = instance.read_attribute(attr.name()).is_none_or(|v| v.is_blank());
        if blank {
            errors.add(attr.name(), "can't be blank");
        }
    }
    errors
}
