//! Predicates deciding which submitted groups each stage accepts.
//!
//! The two stages validate raw input independently. A group can be rejected
//! for storage (for example with a negative member count or without a name)
//! and still be eligible for the invite-link aggregate.

use crate::types::GroupInput;

fn non_blank(value: Option<&str>) -> bool {
    value.is_some_and(|s| !s.trim().is_empty())
}

/// A group can be stored when it has an id, a name and a non-negative
/// integer member count.
pub fn is_storable_group(group: &GroupInput) -> bool {
    non_blank(group.sk()) && non_blank(group.name()) && group.member_count().is_some()
}

/// A group can be featured when it has an id, an invite code and any numeric
/// member count.
pub fn is_invite_eligible(group: &GroupInput) -> bool {
    non_blank(group.sk()) && non_blank(group.invite_code()) && group.total_members.is_number()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn group(value: Value) -> GroupInput {
        GroupInput::from_value(value)
    }

    #[test]
    fn test_storable_group() {
        assert!(is_storable_group(&group(
            json!({"SK": "1@g.us", "Name": "Foo", "TotalMembers": 0})
        )));
        assert!(is_storable_group(&group(
            json!({"SK": "1@g.us", "Name": "Foo", "TotalMembers": 10, "InviteCode": ""})
        )));
        assert!(is_storable_group(&group(
            json!({"SK": "1@g.us", "Name": "Foo", "TotalMembers": 10.0})
        )));
        assert!(is_storable_group(&group(
            json!({"SK": "1@g.us", "Name": "Foo", "TotalMembers": -0.0})
        )));
    }

    #[test]
    fn test_storable_group_rejects_every_broken_field_combination() {
        let bad_sk = [json!(null), json!(""), json!("   "), json!(7)];
        let bad_name = [json!(null), json!(""), json!("\t"), json!(["Foo"])];
        let bad_members = [json!(null), json!(-1), json!("12"), json!(1.5)];

        for sk in &bad_sk {
            assert!(!is_storable_group(&group(
                json!({"SK": sk, "Name": "Foo", "TotalMembers": 3})
            )));
            for name in &bad_name {
                assert!(!is_storable_group(&group(
                    json!({"SK": sk, "Name": name, "TotalMembers": 3})
                )));
                for members in &bad_members {
                    assert!(!is_storable_group(&group(
                        json!({"SK": sk, "Name": name, "TotalMembers": members})
                    )));
                }
            }
        }
        for name in &bad_name {
            assert!(!is_storable_group(&group(
                json!({"SK": "1@g.us", "Name": name, "TotalMembers": 3})
            )));
        }
        for members in &bad_members {
            assert!(!is_storable_group(&group(
                json!({"SK": "1@g.us", "Name": "Foo", "TotalMembers": members})
            )));
        }
    }

    #[test]
    fn test_invite_eligible() {
        assert!(is_invite_eligible(&group(
            json!({"SK": "1@g.us", "InviteCode": "abc", "TotalMembers": 5})
        )));
        assert!(!is_invite_eligible(&group(
            json!({"SK": "1@g.us", "InviteCode": "  ", "TotalMembers": 5})
        )));
        assert!(!is_invite_eligible(&group(
            json!({"SK": "1@g.us", "InviteCode": 12, "TotalMembers": 5})
        )));
        assert!(!is_invite_eligible(&group(
            json!({"SK": "", "InviteCode": "abc", "TotalMembers": 5})
        )));
        assert!(!is_invite_eligible(&group(
            json!({"SK": "1@g.us", "InviteCode": "abc", "TotalMembers": "5"})
        )));
    }

    #[test]
    fn test_predicates_diverge() {
        // Not storable, but still eligible for invite links.
        let negative = group(json!({"SK": "1@g.us", "InviteCode": "abc", "TotalMembers": -4}));
        assert!(!is_storable_group(&negative));
        assert!(is_invite_eligible(&negative));

        // Storable, but nothing to feature.
        let no_code = group(json!({"SK": "1@g.us", "Name": "Foo", "TotalMembers": 4}));
        assert!(is_storable_group(&no_code));
        assert!(!is_invite_eligible(&no_code));
    }
}
