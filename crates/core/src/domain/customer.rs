use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CustomerId(pub String);

/// Identity reference carried by a transaction, as supplied by the data collaborator.
///
/// A ref without an id is unresolvable and lands in the walk-in bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    #[serde(default)]
    pub id: CustomerId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub organization_name: Option<String>,
}

impl CustomerRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: CustomerId(id.into()), name: name.into(), email: None, organization_name: None }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_organization(mut self, organization_name: impl Into<String>) -> Self {
        self.organization_name = Some(organization_name.into());
        self
    }

    pub fn is_resolvable(&self) -> bool {
        !self.id.0.trim().is_empty()
    }
}

/// Grouping key for aggregation. Known customers sort before the walk-in bucket.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CustomerKey {
    Known(CustomerId),
    WalkIn,
}

impl CustomerKey {
    pub fn for_ref(customer: Option<&CustomerRef>) -> Self {
        match customer {
            Some(customer) if customer.is_resolvable() => {
                Self::Known(CustomerId(customer.id.0.trim().to_string()))
            }
            _ => Self::WalkIn,
        }
    }

    pub fn is_walk_in(&self) -> bool {
        matches!(self, Self::WalkIn)
    }
}

impl fmt::Display for CustomerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(id) => f.write_str(&id.0),
            Self::WalkIn => f.write_str(WALK_IN_CUSTOMER_ID),
        }
    }
}

/// Identifier reported for the synthetic walk-in customer.
pub const WALK_IN_CUSTOMER_ID: &str = "walk-in";

#[cfg(test)]
mod tests {
    use super::{CustomerId, CustomerKey, CustomerRef};

    #[test]
    fn blank_ids_resolve_to_walk_in() {
        let blank = CustomerRef::new("   ", "Nobody");
        assert_eq!(CustomerKey::for_ref(Some(&blank)), CustomerKey::WalkIn);
        assert_eq!(CustomerKey::for_ref(None), CustomerKey::WalkIn);
    }

    #[test]
    fn known_ids_are_trimmed() {
        let customer = CustomerRef::new(" cust-7 ", "Ada");
        assert_eq!(
            CustomerKey::for_ref(Some(&customer)),
            CustomerKey::Known(CustomerId("cust-7".to_string()))
        );
    }

    #[test]
    fn walk_in_sorts_after_known_customers() {
        let known = CustomerKey::Known(CustomerId("zzz".to_string()));
        assert!(known < CustomerKey::WalkIn);
        assert_eq!(CustomerKey::WalkIn.to_string(), "walk-in");
    }

    #[test]
    fn partial_refs_decode_instead_of_failing() {
        let nameless: CustomerRef = serde_json::from_str(r#"{"id": "a"}"#).expect("nameless ref");
        let anonymous: CustomerRef = serde_json::from_str(r#"{"name": "Ana"}"#).expect("no id");

        assert_eq!(CustomerKey::for_ref(Some(&nameless)), CustomerKey::Known(CustomerId("a".into())));
        assert!(nameless.name.is_empty());
        assert_eq!(CustomerKey::for_ref(Some(&anonymous)), CustomerKey::WalkIn);
    }
}
