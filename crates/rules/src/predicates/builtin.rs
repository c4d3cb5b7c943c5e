//! Built-in predicate sets for each event family.

use serde_json::Value;

use streamcue_core::value::{coerce_id, coerce_number, coerce_string};
use streamcue_core::{EventFamily, Payload};

use super::PredicateUpdate;
use crate::schema::Rule;

type TextField = fn(&Payload) -> Option<&str>;
type NumberField = fn(&Payload) -> Option<f64>;

pub(super) fn for_family(family: EventFamily) -> PredicateUpdate {
    let update = with_roles(PredicateUpdate::new()).comparator("any", |_: &Rule, _: &Payload| true);
    match family {
        EventFamily::Chat => with_text_comparators(update, |p| p.comment.as_deref()),
        EventFamily::Gift => with_text_comparators(update, |p| p.gift_name.as_deref())
            .comparator("equal", gift_equal)
            .comparator("InRange", in_range(|p| p.diamond_count)),
        EventFamily::Bits => update
            .comparator("equal", number_equal(|p| p.bits_amount))
            .comparator("InRange", in_range(|p| p.bits_amount)),
        EventFamily::Likes => update
            .comparator("equal", number_equal(|p| p.like_count))
            .comparator("InRange", in_range(|p| p.like_count)),
        EventFamily::Follow => update.comparator("equal", |rule: &Rule, p: &Payload| {
            match (operand_text(rule.value.as_ref()), p.unique_id.as_deref()) {
                (Some(expected), Some(actual)) => expected == actual,
                _ => false,
            }
        }),
    }
}

// ── Roles ───────────────────────────────────────────────────────────

fn with_roles(update: PredicateUpdate) -> PredicateUpdate {
    update
        .role("any", |_: &Payload| true)
        .role("sub", |p: &Payload| p.is_subscriber)
        .role("mod", |p: &Payload| p.is_moderator)
        .role("gifter", |p: &Payload| p.is_new_gifter)
}

// ── Comparators ─────────────────────────────────────────────────────

fn with_text_comparators(update: PredicateUpdate, field: TextField) -> PredicateUpdate {
    update
        .comparator("equal", text_op(field, |text, operand| text == operand))
        .comparator("startsWith", text_op(field, |text, operand| text.starts_with(operand)))
        .comparator("endsWith", text_op(field, |text, operand| text.ends_with(operand)))
        .comparator("contains", text_op(field, |text, operand| text.contains(operand)))
}

fn text_op(
    field: TextField,
    op: fn(&str, &str) -> bool,
) -> impl Fn(&Rule, &Payload) -> bool + Send + Sync + 'static {
    move |rule: &Rule, payload: &Payload| match (field(payload), operand_text(rule.value.as_ref())) {
        (Some(text), Some(operand)) => op(text, &operand),
        _ => false,
    }
}

fn number_equal(field: NumberField) -> impl Fn(&Rule, &Payload) -> bool + Send + Sync + 'static {
    move |rule: &Rule, payload: &Payload| match (field(payload), rule.value.as_ref().and_then(coerce_number)) {
        (Some(amount), Some(expected)) => amount == expected,
        _ => false,
    }
}

/// `lessThan` is the lower bound and `greaterThan` the upper bound, both inclusive.
fn in_range(field: NumberField) -> impl Fn(&Rule, &Payload) -> bool + Send + Sync + 'static {
    move |rule: &Rule, payload: &Payload| {
        let lower = rule.less_than.as_ref().and_then(coerce_number);
        let upper = rule.greater_than.as_ref().and_then(coerce_number);
        match (field(payload), lower, upper) {
            (Some(amount), Some(lower), Some(upper)) => lower <= amount && amount <= upper,
            _ => false,
        }
    }
}

/// Gift `equal` accepts either the gift name or its numeric id.
fn gift_equal(rule: &Rule, payload: &Payload) -> bool {
    let Some(operand) = rule.value.as_ref() else {
        return false;
    };
    let by_name = match (payload.gift_name.as_deref(), coerce_string(operand)) {
        (Some(name), Some(expected)) => name == expected,
        _ => false,
    };
    let by_id = match (payload.gift_id, coerce_id(operand)) {
        (Some(id), Some(expected)) => id == expected,
        _ => false,
    };
    by_name || by_id
}

fn operand_text(value: Option<&Value>) -> Option<String> {
    value.and_then(coerce_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicates::PredicateLibrary;
    use serde_json::json;

    fn rule(v: Value) -> Rule {
        serde_json::from_value(v).unwrap()
    }

    fn payload(v: Value) -> Payload {
        Payload::from_value(v).unwrap()
    }

    fn compare(family: EventFamily, name: &str, r: &Rule, p: &Payload) -> bool {
        let library = PredicateLibrary::with_builtins();
        let check = library.comparator_check(family, name).unwrap();
        check(r, p)
    }

    #[test]
    fn chat_starts_with_is_exact_prefix() {
        let r = rule(json!({"value": "!go"}));
        assert!(!compare(EventFamily::Chat, "startsWith", &r, &payload(json!({"comment": "!gamble 50"}))));
        assert!(compare(EventFamily::Chat, "startsWith", &r, &payload(json!({"comment": "!go north"}))));
    }

    #[test]
    fn chat_text_comparators() {
        let r = rule(json!({"value": "hello"}));
        let p = payload(json!({"comment": "say hello there"}));
        assert!(compare(EventFamily::Chat, "contains", &r, &p));
        assert!(!compare(EventFamily::Chat, "equal", &r, &p));
        assert!(!compare(EventFamily::Chat, "endsWith", &r, &p));
        assert!(compare(EventFamily::Chat, "endsWith", &rule(json!({"value": "there"})), &p));
    }

    #[test]
    fn missing_comment_never_matches() {
        let r = rule(json!({"value": "x"}));
        assert!(!compare(EventFamily::Chat, "contains", &r, &payload(json!({}))));
    }

    #[test]
    fn bits_in_range_uses_lower_and_upper_bounds() {
        let r = rule(json!({"comparator": "InRange", "lessThan": 10, "greaterThan": 50}));
        assert!(compare(EventFamily::Bits, "InRange", &r, &payload(json!({"bitsAmount": 25}))));
        assert!(!compare(EventFamily::Bits, "InRange", &r, &payload(json!({"bitsAmount": 5}))));
        assert!(compare(EventFamily::Bits, "InRange", &r, &payload(json!({"bitsAmount": 50}))));
    }

    #[test]
    fn in_range_coerces_string_operands() {
        let r = rule(json!({"lessThan": "100", "greaterThan": "500"}));
        assert!(compare(EventFamily::Gift, "InRange", &r, &payload(json!({"diamondCount": 299}))));
    }

    #[test]
    fn in_range_malformed_operand_never_matches() {
        let r = rule(json!({"lessThan": "ten", "greaterThan": 50}));
        assert!(!compare(EventFamily::Likes, "InRange", &r, &payload(json!({"likeCount": 25}))));
    }

    #[test]
    fn gift_equal_by_name_or_id() {
        let p = payload(json!({"giftName": "Rose", "giftId": 5655}));
        assert!(compare(EventFamily::Gift, "equal", &rule(json!({"value": "Rose"})), &p));
        assert!(compare(EventFamily::Gift, "equal", &rule(json!({"value": "5655"})), &p));
        assert!(!compare(EventFamily::Gift, "equal", &rule(json!({"value": "Lion"})), &p));
    }

    #[test]
    fn number_equal_coerces() {
        let r = rule(json!({"value": "100"}));
        assert!(compare(EventFamily::Likes, "equal", &r, &payload(json!({"likeCount": 100}))));
        assert!(!compare(EventFamily::Likes, "equal", &r, &payload(json!({"likeCount": 99}))));
    }

    #[test]
    fn follow_equal_matches_unique_id() {
        let r = rule(json!({"value": "fan42"}));
        assert!(compare(EventFamily::Follow, "equal", &r, &payload(json!({"uniqueId": "fan42"}))));
    }

    #[test]
    fn role_checks_default_to_false() {
        let library = PredicateLibrary::with_builtins();
        let sub = library.role_check(EventFamily::Chat, "sub").unwrap();
        let gifter = library.role_check(EventFamily::Gift, "gifter").unwrap();
        assert!(!sub(&payload(json!({}))));
        assert!(sub(&payload(json!({"isSubscriber": true}))));
        assert!(gifter(&payload(json!({"isNewGifter": "true"}))));
    }
}
