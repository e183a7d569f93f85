//! Output descriptor synthesis for the four standard script types.

use serde::{Deserialize, Serialize};

use crate::keys::derivation::{format_path, parse_path};
use crate::keys::{ExtendedPrivateKey, KeyError, MasterKeyPair};

/// Script type of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScriptType {
    P2pkh,
    P2sh,
    P2wpkh,
    P2tr,
}

impl ScriptType {
    pub const ALL: [ScriptType; 4] = [
        ScriptType::P2pkh,
        ScriptType::P2sh,
        ScriptType::P2wpkh,
        ScriptType::P2tr,
    ];

    /// Account-level derivation path
    pub fn account_path(&self) -> &'static str {
        match self {
            ScriptType::P2pkh => "m/44'/0'/0'",
            ScriptType::P2sh => "m/49'/0'/0'",
            ScriptType::P2wpkh => "m/84'/0'/0'",
            ScriptType::P2tr => "m/86'/0'/0'",
        }
    }

    fn wrap(&self, key_expr: &str) -> String {
        match self {
            ScriptType::P2pkh => format!("pkh({})", key_expr),
            ScriptType::P2sh => format!("sh(wpkh({}))", key_expr),
            ScriptType::P2wpkh => format!("wpkh({})", key_expr),
            ScriptType::P2tr => format!("tr({})", key_expr),
        }
    }
}

impl std::fmt::Display for ScriptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScriptType::P2pkh => "P2PKH",
            ScriptType::P2sh => "P2SH",
            ScriptType::P2wpkh => "P2WPKH",
            ScriptType::P2tr => "P2TR",
        };
        f.write_str(name)
    }
}

/// Receive/change descriptor pair for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(rename = "type")]
    pub script_type: ScriptType,
    pub path: String,
    pub receive_descriptor: String,
    pub change_descriptor: String,
    pub is_active: bool,
}

impl Descriptor {
    /// `(expression, internal)` for the receive and change branches
    pub fn branches(&self) -> [(&str, bool); 2] {
        [
            (self.receive_descriptor.as_str(), false),
            (self.change_descriptor.as_str(), true),
        ]
    }
}

/// Build the descriptor for one script type
///
/// `<wrapper>([fingerprint/path]xprv/0/*)` for receive and `/1/*` for change.
pub fn build_descriptor(
    master: &MasterKeyPair,
    script_type: ScriptType,
) -> Result<Descriptor, KeyError> {
    let path = parse_path(script_type.account_path())?;
    let xprv = ExtendedPrivateKey::derive(master, &path)?;

    let origin = format!("[{}/{}]{}", master.fingerprint(), path, xprv);

    Ok(Descriptor {
        script_type,
        path: format_path(&path),
        receive_descriptor: script_type.wrap(&format!("{}/0/*", origin)),
        change_descriptor: script_type.wrap(&format!("{}/1/*", origin)),
        is_active: true,
    })
}

/// All four account descriptors, in fixed order
pub fn derive_descriptors(master: &MasterKeyPair) -> Result<Vec<Descriptor>, KeyError> {
    ScriptType::ALL
        .iter()
        .map(|script_type| build_descriptor(master, *script_type))
        .collect()
}
