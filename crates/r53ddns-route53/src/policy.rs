//! IAM policy generator
//!
//! Produces the least-privilege policy the agent needs for a given set of
//! zones and record names.

use serde_json::{Value, json};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::xml::short_id;
use r53ddns_core::hostname::strip_trailing_dot;

/// Build an IAM policy document for the resolved zones
///
/// `zones` maps zone ids (with or without the `/hostedzone/` prefix) to the
/// normalized record names managed in that zone.
///
/// # Statements
///
/// - `ListHostedZones` and `GetChange` on `*`
/// - `ListResourceRecordSets` on every zone
/// - One `ChangeResourceRecordSets` per zone, limited to UPSERTs of `A` and
///   `AAAA` records with exactly the managed names
pub fn create_policy_for_zones(zones: &BTreeMap<String, Vec<String>>) -> Value {
    let zone_arn = |zone_id: &str| format!("arn:aws:route53:::hostedzone/{}", short_id(zone_id));
    let zone_arns: Vec<String> = zones.keys().map(|zone_id| zone_arn(zone_id.as_str())).collect();

    let mut statements = vec![
        json!({
            "Effect": "Allow",
            "Action": ["route53:ListHostedZones", "route53:GetChange"],
            "Resource": ["*"],
        }),
        json!({
            "Effect": "Allow",
            "Action": ["route53:ListResourceRecordSets"],
            "Resource": zone_arns,
        }),
    ];

    statements.extend(zones.iter().map(|(zone_id, names)| {
        let normalized: Vec<&str> = names.iter().map(|name| strip_trailing_dot(name)).collect();
        json!({
            "Effect": "Allow",
            "Action": ["route53:ChangeResourceRecordSets"],
            "Condition": {
                "ForAllValues:StringEquals": {
                    "route53:ChangeResourceRecordSetsNormalizedRecordNames": normalized,
                    "route53:ChangeResourceRecordSetsRecordTypes": ["A", "AAAA"],
                    "route53:ChangeResourceRecordSetsActions": ["UPSERT"],
                },
            },
            "Resource": [zone_arn(zone_id.as_str())],
        })
    }));

    json!({
        "Version": "2012-10-17",
        "Id": Uuid::new_v4().to_string(),
        "Statement": statements,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([
            (
                "/hostedzone/Z10954171IY44R8NIL2H".to_string(),
                vec!["sub1.test1.tld.".to_string(), "sub2.test1.tld.".to_string()],
            ),
            (
                "/hostedzone/Z20954171IY44R8NIL2H".to_string(),
                vec!["\\100.test2.tld.".to_string()],
            ),
        ])
    }

    #[test]
    fn test_policy_document_shape() {
        let policy = create_policy_for_zones(&input());

        assert_eq!(policy["Version"], "2012-10-17");
        let id = policy["Id"].as_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());

        let statements = policy["Statement"].as_array().unwrap();
        assert_eq!(statements.len(), 4);
        assert_eq!(
            statements[0],
            json!({
                "Effect": "Allow",
                "Action": ["route53:ListHostedZones", "route53:GetChange"],
                "Resource": ["*"],
            })
        );
        assert_eq!(
            statements[1]["Resource"],
            json!([
                "arn:aws:route53:::hostedzone/Z10954171IY44R8NIL2H",
                "arn:aws:route53:::hostedzone/Z20954171IY44R8NIL2H",
            ])
        );
    }

    #[test]
    fn test_change_statement_per_zone() {
        let policy = create_policy_for_zones(&input());
        let statements = policy["Statement"].as_array().unwrap();

        assert_eq!(
            statements[2],
            json!({
                "Effect": "Allow",
                "Action": ["route53:ChangeResourceRecordSets"],
                "Condition": {
                    "ForAllValues:StringEquals": {
                        "route53:ChangeResourceRecordSetsNormalizedRecordNames": [
                            "sub1.test1.tld",
                            "sub2.test1.tld",
                        ],
                        "route53:ChangeResourceRecordSetsRecordTypes": ["A", "AAAA"],
                        "route53:ChangeResourceRecordSetsActions": ["UPSERT"],
                    },
                },
                "Resource": ["arn:aws:route53:::hostedzone/Z10954171IY44R8NIL2H"],
            })
        );
        assert_eq!(
            statements[3]["Condition"]["ForAllValues:StringEquals"]
                ["route53:ChangeResourceRecordSetsNormalizedRecordNames"],
            json!(["\\100.test2.tld"])
        );
    }

    #[test]
    fn test_short_zone_ids_accepted() {
        let zones = BTreeMap::from([("Z1".to_string(), vec!["a.tld.".to_string()])]);

        let policy = create_policy_for_zones(&zones);

        assert_eq!(
            policy["Statement"][2]["Resource"],
            json!(["arn:aws:route53:::hostedzone/Z1"])
        );
    }
}
