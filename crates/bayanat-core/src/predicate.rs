//! Access predicates and the condition encoder.
//!
//! A predicate names a permission-check entry point on the ledger, the
//! resource it is parameterized by, and a placeholder that is replaced by
//! the requesting actor when the predicate is evaluated. Predicates are
//! committed alongside ciphertext, so their encoding must be canonical:
//! see [`crate::canonical::predicate_bytes`].

use serde::{Deserialize, Serialize};

use crate::canonical;
use crate::crypto::Blake3Hash;
use crate::error::{CoreError, Result};
use crate::types::{ActorId, LedgerAddress, ResourceId};

/// Name of the ledger's permission-check function.
pub const PERMISSION_METHOD: &str = "canDecrypt";

/// Placeholder substituted with the requesting actor at evaluation time.
pub const ACTOR_PLACEHOLDER: &str = ":userAddress";

/// Expected outcome of the ledger call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReturnValueTest {
    /// Comparison operator. Only `=` is understood.
    pub comparator: String,
    /// Expected value, `"true"` or `"false"`.
    pub value: String,
}

impl ReturnValueTest {
    /// The test `= true`.
    pub fn is_true() -> Self {
        Self {
            comparator: "=".to_string(),
            value: "true".to_string(),
        }
    }

    /// Apply the test to a boolean returned by the ledger.
    pub fn accepts(&self, returned: bool) -> bool {
        match (self.comparator.as_str(), self.value.as_str()) {
            ("=", "true") => returned,
            ("=", "false") => !returned,
            _ => false,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.comparator != "=" {
            return Err(CoreError::InvalidPredicate(format!(
                "unsupported comparator {:?}",
                self.comparator
            )));
        }
        if self.value != "true" && self.value != "false" {
            return Err(CoreError::InvalidPredicate(format!(
                "unsupported expected value {:?}",
                self.value
            )));
        }
        Ok(())
    }
}

/// A declarative access condition evaluated against ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Predicate {
    /// Chain the ledger lives on.
    pub chain: String,
    /// Ledger contract hosting the permission check.
    pub ledger: LedgerAddress,
    /// Permission-check function name.
    pub method: String,
    /// Positional call parameters: `[resource_id, actor_placeholder]`.
    pub parameters: Vec<String>,
    /// Expected return value.
    pub return_value_test: ReturnValueTest,
}

impl Predicate {
    /// Check the predicate's structure.
    ///
    /// A well-formed predicate has a chain, a method, exactly two
    /// parameters (a canonical resource id and a `:`-prefixed
    /// placeholder) and a supported return-value test.
    pub fn validate(&self) -> Result<()> {
        if self.chain.is_empty() {
            return Err(CoreError::InvalidPredicate("empty chain".into()));
        }
        if self.method.is_empty() {
            return Err(CoreError::InvalidPredicate("empty method".into()));
        }
        if self.parameters.len() != 2 {
            return Err(CoreError::InvalidPredicate(format!(
                "expected 2 parameters, got {}",
                self.parameters.len()
            )));
        }
        ResourceId::parse(&self.parameters[0])?;
        validate_placeholder(&self.parameters[1])?;
        self.return_value_test.validate()
    }

    /// The resource this predicate gates.
    pub fn resource_id(&self) -> Result<ResourceId> {
        let raw = self
            .parameters
            .first()
            .ok_or_else(|| CoreError::InvalidPredicate("missing resource parameter".into()))?;
        ResourceId::parse(raw)
    }

    /// Canonical CBOR bytes of this predicate.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        canonical::predicate_bytes(self)
    }

    /// Blake3 digest of the canonical bytes.
    pub fn digest(&self) -> Result<Blake3Hash> {
        Ok(Blake3Hash::hash(&self.canonical_bytes()?))
    }

    /// Substitute the placeholder with a concrete actor.
    pub fn bind(&self, actor: &ActorId) -> Result<BoundPredicate> {
        self.validate()?;
        Ok(BoundPredicate {
            chain: self.chain.clone(),
            ledger: self.ledger,
            method: self.method.clone(),
            resource_id: self.resource_id()?,
            actor: actor.clone(),
            return_value_test: self.return_value_test.clone(),
        })
    }
}

/// A predicate with its placeholder replaced by a requesting actor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundPredicate {
    pub chain: String,
    pub ledger: LedgerAddress,
    pub method: String,
    pub resource_id: ResourceId,
    pub actor: ActorId,
    pub return_value_test: ReturnValueTest,
}

/// Builds canonical predicates for one chain.
#[derive(Debug, Clone)]
pub struct ConditionEncoder {
    chain: String,
}

impl ConditionEncoder {
    /// Create an encoder for the given chain name.
    pub fn new(chain: impl Into<String>) -> Self {
        Self {
            chain: chain.into(),
        }
    }

    /// The chain predicates are built for.
    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Build the predicate `ledger.canDecrypt(resource_id, placeholder) = true`.
    ///
    /// Identical inputs always yield byte-identical canonical encodings.
    pub fn build(
        &self,
        resource_id: &str,
        ledger: LedgerAddress,
        actor_placeholder: &str,
    ) -> Result<Predicate> {
        let resource_id = ResourceId::parse(resource_id)?;
        validate_placeholder(actor_placeholder)?;

        let predicate = Predicate {
            chain: self.chain.clone(),
            ledger,
            method: PERMISSION_METHOD.to_string(),
            parameters: vec![resource_id.to_string(), actor_placeholder.to_string()],
            return_value_test: ReturnValueTest::is_true(),
        };
        predicate.validate()?;
        Ok(predicate)
    }

    /// Build with the default [`ACTOR_PLACEHOLDER`].
    pub fn build_default(&self, resource_id: &ResourceId, ledger: LedgerAddress) -> Result<Predicate> {
        self.build(resource_id.as_str(), ledger, ACTOR_PLACEHOLDER)
    }
}

fn validate_placeholder(placeholder: &str) -> Result<()> {
    let valid = placeholder.len() > 1
        && placeholder.starts_with(':')
        && placeholder[1..].bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if !valid {
        return Err(CoreError::InvalidPredicate(format!(
            "invalid actor placeholder {:?}",
            placeholder
        )));
    }
    Ok(())
}
