//! Built-in ERC-20 interface, used when no ABI file is configured.

use crate::error::AbiError;
use crate::interface::Interface;

pub const ERC20_ABI: &str = r#"[
  {
    "type": "event",
    "name": "Transfer",
    "anonymous": false,
    "inputs": [
      { "name": "from",  "type": "address", "indexed": true },
      { "name": "to",    "type": "address", "indexed": true },
      { "name": "value", "type": "uint256", "indexed": false }
    ]
  },
  {
    "type": "event",
    "name": "Approval",
    "anonymous": false,
    "inputs": [
      { "name": "owner",   "type": "address", "indexed": true },
      { "name": "spender", "type": "address", "indexed": true },
      { "name": "value",   "type": "uint256", "indexed": false }
    ]
  },
  {
    "type": "function",
    "name": "balanceOf",
    "stateMutability": "view",
    "inputs":  [{ "name": "account", "type": "address" }],
    "outputs": [{ "name": "", "type": "uint256" }]
  },
  {
    "type": "function",
    "name": "decimals",
    "stateMutability": "view",
    "inputs":  [],
    "outputs": [{ "name": "", "type": "uint8" }]
  },
  {
    "type": "function",
    "name": "symbol",
    "stateMutability": "view",
    "inputs":  [],
    "outputs": [{ "name": "", "type": "string" }]
  },
  {
    "type": "function",
    "name": "name",
    "stateMutability": "view",
    "inputs":  [],
    "outputs": [{ "name": "", "type": "string" }]
  }
]"#;

/// Parse [`ERC20_ABI`].
pub fn erc20() -> Result<Interface, AbiError> {
    Interface::parse(ERC20_ABI)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_parses() {
        let iface = erc20().unwrap();
        assert_eq!(iface.events().len(), 2);
        assert_eq!(iface.functions().len(), 4);
        assert_eq!(iface.event_signatures().len(), 2);
        assert_eq!(hex::encode(iface.function("balanceOf").unwrap().selector()), "70a08231");
    }
}
