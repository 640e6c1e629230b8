//! `Interface` — the validated set of events and functions for a contract.

use std::collections::HashSet;

use alloy_json_abi::JsonAbi;
use alloy_primitives::B256;

use crate::error::AbiError;
use crate::types::{EventSpec, FunctionSpec, ParamSpec, ParamType};

/// Events and functions parsed from a JSON ABI. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Interface {
    events: Vec<EventSpec>,
    functions: Vec<FunctionSpec>,
}

impl Interface {
    /// Parse a JSON ABI array.
    ///
    /// Tuples, arrays and other composite types are rejected. Overloaded
    /// functions are kept; [`function`](Self::function) returns the first.
    pub fn parse(json: &str) -> Result<Self, AbiError> {
        let abi: JsonAbi = serde_json::from_str(json)
            .map_err(|e| AbiError::MalformedSpec(format!("invalid JSON ABI: {e}")))?;

        let mut events = Vec::new();
        for event in abi.events() {
            let params = event
                .inputs
                .iter()
                .map(|p| {
                    let ty = parse_type(&event.name, &p.name, &p.ty)?;
                    let spec = ParamSpec::new(p.name.clone(), ty);
                    Ok(if p.indexed { spec.indexed() } else { spec })
                })
                .collect::<Result<Vec<_>, AbiError>>()?;
            let spec = EventSpec::new(event.name.clone(), params);
            events.push(if event.anonymous { spec.anonymous() } else { spec });
        }

        let mut functions = Vec::new();
        for function in abi.functions() {
            let convert = |params: &[alloy_json_abi::Param]| {
                params
                    .iter()
                    .map(|p| Ok(ParamSpec::new(p.name.clone(), parse_type(&function.name, &p.name, &p.ty)?)))
                    .collect::<Result<Vec<_>, AbiError>>()
            };
            functions.push(FunctionSpec::new(
                function.name.clone(),
                convert(&function.inputs)?,
                convert(&function.outputs)?,
            ));
        }

        Self::from_parts(events, functions)
    }

    /// Build from event descriptors with the same validation as [`parse`](Self::parse).
    pub fn from_events(events: Vec<EventSpec>) -> Result<Self, AbiError> {
        Self::from_parts(events, Vec::new())
    }

    pub fn from_parts(events: Vec<EventSpec>, functions: Vec<FunctionSpec>) -> Result<Self, AbiError> {
        let mut names = HashSet::new();
        let mut hashes = HashSet::new();
        for event in &events {
            event.validate()?;
            if !names.insert(event.name.as_str()) {
                return Err(AbiError::MalformedSpec(format!("duplicate event name {}", event.name)));
            }
            if !event.anonymous && !hashes.insert(event.signature_hash()) {
                return Err(AbiError::MalformedSpec(format!(
                    "event {} collides on signature hash {}",
                    event.name,
                    event.signature_hash()
                )));
            }
        }
        for function in &functions {
            function.validate()?;
        }
        Ok(Self { events, functions })
    }

    pub fn events(&self) -> &[EventSpec] {
        &self.events
    }

    pub fn event(&self, name: &str) -> Option<&EventSpec> {
        self.events.iter().find(|e| e.name == name)
    }

    pub fn functions(&self) -> &[FunctionSpec] {
        &self.functions
    }

    pub fn function(&self, name: &str) -> Result<&FunctionSpec, AbiError> {
        self.functions
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| AbiError::UnknownFunction(name.to_string()))
    }

    /// Signature hash of the named event.
    pub fn signature_hash(&self, name: &str) -> Result<B256, AbiError> {
        self.event(name)
            .map(EventSpec::signature_hash)
            .ok_or_else(|| AbiError::UnknownEvent(name.to_string()))
    }

    /// Hashes of every matchable (non-anonymous) event, for subscription filters.
    pub fn event_signatures(&self) -> Vec<B256> {
        self.events
            .iter()
            .filter(|e| !e.anonymous)
            .map(EventSpec::signature_hash)
            .collect()
    }
}

fn parse_type(owner: &str, param: &str, tag: &str) -> Result<ParamType, AbiError> {
    tag.parse().map_err(|e| match e {
        AbiError::MalformedSpec(reason) => AbiError::MalformedSpec(format!("{owner}.{param}: {reason}")),
        other => other,
    })
}
