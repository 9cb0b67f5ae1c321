// kestrel-vm - Shared helpers for integration tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

pub use kestrel_vm::{InterpretResult, RuntimeError, VM, Value, VmConfig};

/// A `Write` sink whose contents can be read back after the VM is done.
#[derive(Clone, Default)]
pub struct Capture(Rc<RefCell<Vec<u8>>>);

impl Capture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A VM whose output and error sinks are captured.
pub struct Harness {
    pub vm: VM,
    out: Capture,
    err: Capture,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        let out = Capture::default();
        let err = Capture::default();
        let mut vm = VM::with_config(config);
        vm.set_output(Box::new(out.clone()));
        vm.set_error_output(Box::new(err.clone()));
        Self { vm, out, err }
    }

    pub fn run(&mut self, src: &str) -> InterpretResult {
        self.vm.interpret_source(src)
    }

    pub fn stdout(&self) -> String {
        self.out.contents()
    }

    pub fn stderr(&self) -> String {
        self.err.contents()
    }
}

/// Run a program on a fresh VM: (result, stdout, stderr).
pub fn run(src: &str) -> (InterpretResult, String, String) {
    let mut harness = Harness::new();
    let result = harness.run(src);
    (result, harness.stdout(), harness.stderr())
}

/// Run a program that must succeed and return its printed lines.
pub fn output(src: &str) -> Vec<String> {
    let (result, out, err) = run(src);
    assert_eq!(result, InterpretResult::Ok, "stderr: {}", err);
    out.lines().map(str::to_string).collect()
}

/// Run a program that must fail at runtime and return the error.
pub fn runtime_error(src: &str) -> RuntimeError {
    let mut harness = Harness::new();
    let result = harness.run(src);
    assert_eq!(
        result,
        InterpretResult::RuntimeError,
        "stdout: {}",
        harness.stdout()
    );
    assert_eq!(harness.vm.stack_depth(), 0);
    match harness.vm.last_failure() {
        Some(failure) => failure.error.clone(),
        None => panic!("no failure recorded for: {}", src),
    }
}
