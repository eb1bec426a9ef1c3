// Scripted device for workflow tests - no network

use std::cell::RefCell;
use std::collections::HashSet;

use crate::device::errors::DeviceError;
use crate::device::traits::DeviceOperations;
use crate::device::types::{Operation, SessionToken};

/// Device whose operations succeed unless told to fail, recording every call
#[derive(Debug)]
pub struct ScriptedDevice {
    pub failing: RefCell<HashSet<Operation>>,
    pub token: RefCell<String>,
    pub calls: RefCell<Vec<Operation>>,
}

impl Default for ScriptedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedDevice {
    pub fn new() -> Self {
        Self {
            failing: RefCell::new(HashSet::new()),
            token: RefCell::new("c0ffee".to_string()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn fail(&self, operation: Operation) {
        self.failing.borrow_mut().insert(operation);
    }

    pub fn heal(&self, operation: Operation) {
        self.failing.borrow_mut().remove(&operation);
    }

    pub fn set_token(&self, token: &str) {
        *self.token.borrow_mut() = token.to_string();
    }

    pub fn calls(&self) -> Vec<Operation> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        self.calls.borrow().iter().filter(|op| **op == operation).count()
    }

    fn respond(&self, operation: Operation) -> Result<(), DeviceError> {
        self.calls.borrow_mut().push(operation);
        if self.failing.borrow().contains(&operation) {
            return Err(DeviceError::UnexpectedStatus {
                operation,
                status: 500,
            });
        }
        Ok(())
    }
}

impl DeviceOperations for ScriptedDevice {
    fn fetch_root(&self) -> Result<SessionToken, DeviceError> {
        self.respond(Operation::FetchRoot)?;
        Ok(SessionToken::new(self.token.borrow().as_str()))
    }

    fn initialize_session(&self, _token: &SessionToken) -> Result<(), DeviceError> {
        self.respond(Operation::InitializeSession)
    }

    fn authenticate(&self, _token: &SessionToken) -> Result<(), DeviceError> {
        self.respond(Operation::Authenticate)
    }

    fn apply_configuration(&self, _token: &SessionToken) -> Result<(), DeviceError> {
        self.respond(Operation::ApplyConfiguration)
    }
}
