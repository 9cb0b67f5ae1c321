// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Lexical scopes, local slots and upvalue resolution.

use kestrel_parser::TokenKind;

use crate::opcode::OpCode;

use super::codegen::Compiler;
use super::types::{CompileErrorKind, FunctionState, Local, LoopContext, Result, Upvalue};

/// Most locals a function may have, including the callee slot.
pub const MAX_LOCALS: usize = 256;

/// Most upvalues a function may capture.
pub const MAX_UPVALUES: usize = 256;

/// Scan `state`'s locals newest first for `name`.
fn resolve_local(
    state: &FunctionState,
    name: &str,
) -> std::result::Result<Option<u8>, CompileErrorKind> {
    for (slot, local) in state.locals.iter().enumerate().rev() {
        if local.name == name {
            if local.depth.is_none() {
                return Err(CompileErrorKind::OwnInitializer);
            }
            return Ok(Some(slot as u8));
        }
    }
    Ok(None)
}

impl Compiler {
    pub(super) fn begin_scope(&mut self) {
        self.state.scope_depth += 1;
    }

    /// Leave a block, discarding its locals newest first.
    pub(super) fn end_scope(&mut self) {
        self.state.scope_depth -= 1;
        let depth = self.state.scope_depth;
        while let Some(captured) = self
            .state
            .locals
            .last()
            .filter(|local| local.depth.is_none_or(|d| d > depth))
            .map(|local| local.is_captured)
        {
            self.emit_op(if captured {
                OpCode::CloseUpvalue
            } else {
                OpCode::Pop
            });
            self.state.locals.pop();
        }
    }

    /// Emit pops for every local deeper than `depth` without forgetting
    /// them. Used before `break`/`continue` jump out of nested blocks.
    pub(super) fn discard_locals_above(&mut self, depth: usize) {
        let ops: Vec<OpCode> = self
            .state
            .locals
            .iter()
            .rev()
            .take_while(|local| local.depth.is_none_or(|d| d > depth))
            .map(|local| {
                if local.is_captured {
                    OpCode::CloseUpvalue
                } else {
                    OpCode::Pop
                }
            })
            .collect();
        for op in ops {
            self.emit_op(op);
        }
    }

    fn add_local(&mut self, name: String) -> Result<()> {
        if self.state.locals.len() >= MAX_LOCALS {
            return Err(self.error_at_previous(CompileErrorKind::TooManyLocals));
        }
        self.state.locals.push(Local {
            name,
            depth: None,
            is_captured: false,
        });
        Ok(())
    }

    /// Declare the identifier just consumed as a local in the current
    /// scope. Globals are late bound and need no declaration.
    pub(super) fn declare_variable(&mut self) -> Result<()> {
        if self.state.scope_depth == 0 {
            return Ok(());
        }
        let name = self.previous_lexeme();
        self.add_local(name)
    }

    /// Declare the identifier just consumed as a parameter. Two parameters
    /// of one function may not share a name.
    pub(super) fn declare_parameter(&mut self) -> Result<()> {
        let name = self.previous_lexeme();
        let depth = self.state.scope_depth;
        let duplicate = self
            .state
            .locals
            .iter()
            .any(|local| local.depth == Some(depth) && local.name == name);
        if duplicate {
            return Err(self.error_at_previous(CompileErrorKind::Duplicate {
                what: "parameter",
                name,
            }));
        }
        self.add_local(name)?;
        self.mark_initialized();
        Ok(())
    }

    pub(super) fn mark_initialized(&mut self) {
        let depth = self.state.scope_depth;
        if depth == 0 {
            return;
        }
        if let Some(local) = self.state.locals.last_mut() {
            local.depth = Some(depth);
        }
    }

    /// Consume a variable name and declare it. Returns the name's constant
    /// index for globals, or 0 for locals.
    pub(super) fn parse_variable(&mut self, message: &str) -> Result<u8> {
        self.consume(TokenKind::Identifier, message)?;
        self.declare_variable()?;
        if self.state.scope_depth > 0 {
            return Ok(0);
        }
        let name = self.previous_lexeme();
        self.identifier_constant(&name)
    }

    pub(super) fn define_variable(&mut self, global: u8) {
        if self.state.scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_op_arg(OpCode::DefineGlobal, global);
    }

    /// Find `name` among the current function's locals.
    pub(super) fn resolve_local(&self, name: &str) -> Result<Option<u8>> {
        resolve_local(&self.state, name).map_err(|kind| self.error_at_previous(kind))
    }

    /// The compile frame at `level`, where 0 is the script and the current
    /// function is `self.enclosing.len()`.
    fn frame_mut(&mut self, level: usize) -> &mut FunctionState {
        if level >= self.enclosing.len() {
            &mut self.state
        } else {
            &mut self.enclosing[level]
        }
    }

    /// Resolve `name` as a capture of the function at `level`, walking
    /// outward through enclosing functions.
    pub(super) fn resolve_upvalue(&mut self, level: usize, name: &str) -> Result<Option<u8>> {
        if level == 0 {
            return Ok(None);
        }
        let parent = level - 1;

        let local = resolve_local(self.frame_mut(parent), name)
            .map_err(|kind| self.error_at_previous(kind))?;
        if let Some(slot) = local {
            self.frame_mut(parent).locals[slot as usize].is_captured = true;
            return self.add_upvalue(level, slot, true).map(Some);
        }

        if let Some(index) = self.resolve_upvalue(parent, name)? {
            return self.add_upvalue(level, index, false).map(Some);
        }

        Ok(None)
    }

    fn add_upvalue(&mut self, level: usize, index: u8, is_local: bool) -> Result<u8> {
        let candidate = Upvalue { index, is_local };
        let upvalues = &self.frame_mut(level).upvalues;
        if let Some(existing) = upvalues.iter().position(|u| *u == candidate) {
            return Ok(existing as u8);
        }
        if upvalues.len() >= MAX_UPVALUES {
            return Err(self.error_at_previous(CompileErrorKind::TooManyUpvalues));
        }
        let upvalues = &mut self.frame_mut(level).upvalues;
        upvalues.push(candidate);
        Ok((upvalues.len() - 1) as u8)
    }

    /// Open a loop context whose `continue` lands on `continue_target`.
    pub(super) fn begin_loop(&mut self, continue_target: usize) {
        let scope_depth = self.state.scope_depth;
        self.state.loops.push(LoopContext {
            continue_target,
            scope_depth,
            break_patches: Vec::new(),
            continue_patches: Vec::new(),
        });
    }

    /// Close the innermost loop: breaks land here, continues on the
    /// loop's continue target.
    pub(super) fn end_loop(&mut self) -> Result<()> {
        let Some(context) = self.state.loops.pop() else {
            return Ok(());
        };
        for operand in context.break_patches {
            self.patch_jump(operand)?;
        }
        for operand in context.continue_patches {
            self.chunk()
                .patch_backward(operand, context.continue_target)
                .map_err(|_| self.error_at_previous(CompileErrorKind::LoopTooLarge))?;
        }
        Ok(())
    }

    /// Compile `break;` or `continue;` after its keyword.
    pub(super) fn loop_jump(&mut self, op: OpCode) -> Result<()> {
        let keyword = if op == OpCode::Break {
            "break"
        } else {
            "continue"
        };
        let Some(depth) = self.state.loops.last().map(|l| l.scope_depth) else {
            return Err(self.error_at_previous(CompileErrorKind::OutsideLoop(keyword)));
        };
        self.consume(TokenKind::Semicolon, &format!("Expect ';' after '{}'.", keyword))?;

        self.discard_locals_above(depth);
        let operand = self.emit_jump(op);
        if let Some(context) = self.state.loops.last_mut() {
            if op == OpCode::Break {
                context.break_patches.push(operand);
            } else {
                context.continue_patches.push(operand);
            }
        }
        Ok(())
    }
}
