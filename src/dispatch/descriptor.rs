// CmsVault — Operation descriptors
//
// The serializable form of one lifecycle or access operation. It is what the
// dispatcher hands to a remote agent, so every field a host needs to repeat
// the operation locally is carried here, and nothing host-specific.
//
//   { "version": 1, "operation": { "kind": "remove", "identity": "svc", "retain": 0 } }

use serde::{Deserialize, Serialize};

use crate::access::{AccessReport, CertificateTarget};
use crate::codec::Secret;
use crate::error::{Result, VaultError};
use crate::lifecycle::{Inventory, ProtectOptions, ProtectOutcome, RemoveOutcome};
use crate::store::Identity;

pub const DESCRIPTOR_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    Protect {
        identity: Identity,
        secret: Secret,
        #[serde(default)]
        options: ProtectOptions,
    },
    Remove {
        identity: Identity,
        retain: usize,
    },
    Show {
        #[serde(default)]
        identity: Option<Identity>,
    },
    Grant {
        target: CertificateTarget,
        principals: Vec<String>,
    },
    Revoke {
        target: CertificateTarget,
        principals: Vec<String>,
    },
    Reset {
        target: CertificateTarget,
        #[serde(default)]
        confirmed: bool,
    },
    ShowAccess {
        target: CertificateTarget,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Protect { .. } => "protect",
            Operation::Remove { .. } => "remove",
            Operation::Show { .. } => "show",
            Operation::Grant { .. } => "grant",
            Operation::Revoke { .. } => "revoke",
            Operation::Reset { .. } => "reset",
            Operation::ShowAccess { .. } => "show_access",
        }
    }
}

/// What one host reports back for an `Operation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum OperationOutput {
    Protected(ProtectOutcome),
    Removed(RemoveOutcome),
    Inventory(Inventory),
    Access(AccessReport),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub version: u32,
    pub operation: Operation,
}

impl OperationDescriptor {
    pub fn new(operation: Operation) -> Self {
        Self {
            version: DESCRIPTOR_VERSION,
            operation,
        }
    }

    pub fn check_version(&self) -> Result<()> {
        if self.version != DESCRIPTOR_VERSION {
            return Err(VaultError::InvalidArgument(format!(
                "unsupported operation descriptor version {} (expected {})",
                self.version, DESCRIPTOR_VERSION
            )));
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn svc() -> Identity {
        Identity::parse("svc").unwrap()
    }

    #[test]
    fn test_wire_shape() {
        let descriptor = OperationDescriptor::new(Operation::Remove {
            identity: svc(),
            retain: 0,
        });
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "version": 1,
                "operation": {"kind": "remove", "identity": "svc", "retain": 0}
            })
        );
    }

    #[test]
    fn test_protect_carries_secret_and_default_options() {
        let json = r#"{
            "version": 1,
            "operation": {
                "kind": "protect",
                "identity": "svc",
                "secret": {"Username": "u", "Password": "p"}
            }
        }"#;
        let descriptor: OperationDescriptor = serde_json::from_str(json).unwrap();
        match descriptor.operation {
            Operation::Protect { identity, secret, options } => {
                assert_eq!(identity, svc());
                assert_eq!(secret, Secret::new("u", "p"));
                assert_eq!(options, ProtectOptions::default());
            }
            other => panic!("unexpected operation {:?}", other),
        }
    }

    #[test]
    fn test_debug_never_shows_password() {
        let op = Operation::Protect {
            identity: svc(),
            secret: Secret::new("u", "Hunter2!"),
            options: ProtectOptions::default(),
        };
        assert!(!format!("{:?}", op).contains("Hunter2!"));
    }

    #[test]
    fn test_target_forms() {
        let grant: Operation = serde_json::from_value(serde_json::json!({
            "kind": "grant",
            "target": {"thumbprint": "AB12"},
            "principals": ["CORP\\svc"]
        }))
        .unwrap();
        assert_eq!(
            grant,
            Operation::Grant {
                target: CertificateTarget::Thumbprint("AB12".into()),
                principals: vec!["CORP\\svc".into()],
            }
        );
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut descriptor = OperationDescriptor::new(Operation::Show { identity: None });
        assert!(descriptor.check_version().is_ok());
        descriptor.version = 2;
        assert!(matches!(
            descriptor.check_version(),
            Err(VaultError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_invalid_identity_rejected_on_decode() {
        let result: std::result::Result<Operation, _> = serde_json::from_value(serde_json::json!({
            "kind": "remove",
            "identity": "",
            "retain": 1
        }));
        assert!(result.is_err());
    }
}
