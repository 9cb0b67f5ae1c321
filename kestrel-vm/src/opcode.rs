// kestrel-vm - Bytecode compiler and virtual machine for the Kestrel programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Bytecode instruction definitions.

/// Bytecode instructions for the Kestrel VM.
///
/// Each instruction is one opcode byte followed by its operands, all stored
/// in the chunk's byte vector. Jump offsets are unsigned 16-bit big-endian
/// distances measured from the byte after the operand; the opcode decides the
/// direction.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    // =========================================================================
    // Constants & Stack
    // =========================================================================
    /// Push constants[u8].
    Constant,
    Null,
    True,
    False,
    Pop,

    // =========================================================================
    // Variables
    // =========================================================================
    /// Push stack[base + u8].
    GetLocal,
    /// stack[base + u8] = peek(0). Leaves the value on the stack.
    SetLocal,
    /// Push the global named by constants[u8].
    GetGlobal,
    /// Define the global named by constants[u8] as pop().
    DefineGlobal,
    /// Assign an existing global named by constants[u8]. Leaves the value.
    SetGlobal,
    /// Push the value of the current closure's upvalue[u8].
    GetUpvalue,
    /// Store peek(0) into the current closure's upvalue[u8].
    SetUpvalue,
    /// Replace an instance on top with its field named by constants[u8].
    GetProperty,
    /// instance.field = value, with `[instance, value]` on top. Leaves value.
    SetProperty,

    // =========================================================================
    // Operators
    // =========================================================================
    Equal,
    Greater,
    Less,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Not,
    Negate,

    // =========================================================================
    // Statements & Control Flow
    // =========================================================================
    Print,
    /// Forward jump by u16.
    Jump,
    /// Forward jump by u16 if peek(0) is falsey. Does not pop.
    JumpIfFalse,
    /// Backward jump by u16.
    Loop,
    /// Leave the innermost loop: forward jump by u16.
    Break,
    /// Restart the innermost loop: backward jump by u16.
    Continue,

    // =========================================================================
    // Functions & Closures
    // =========================================================================
    /// Call the value below u8 arguments.
    Call,
    /// Build a struct instance from u8 `name, value` pairs; second operand
    /// byte is the force flag.
    Construct,
    /// Create a closure over the function in constants[u8]. Followed by one
    /// `(is_local, index)` byte pair per upvalue.
    Closure,
    /// Close every upvalue aliasing the top slot, then pop it.
    CloseUpvalue,
    Return,

    // =========================================================================
    // Structs & Collections
    // =========================================================================
    /// Declare a struct: u8 name constant, u8 field count, then a
    /// `(name constant, default constant)` byte pair per field.
    Struct,
    /// Build an array from the top u8 values.
    Array,
    /// Build a map from the top u8 key/value pairs.
    Map,
    /// Push container[index] for `[container, index]` on top.
    ArrayGet,
    /// container[index] = value for `[container, index, value]`. Leaves value.
    ArraySet,
    /// Push container[start:end] for `[container, start, end]`; `null`
    /// bounds mean "from the beginning" and "to the end".
    ArraySlice,
}

impl OpCode {
    /// Every opcode, indexed by its byte value.
    const ALL: [OpCode; 41] = [
        OpCode::Constant,
        OpCode::Null,
        OpCode::True,
        OpCode::False,
        OpCode::Pop,
        OpCode::GetLocal,
        OpCode::SetLocal,
        OpCode::GetGlobal,
        OpCode::DefineGlobal,
        OpCode::SetGlobal,
        OpCode::GetUpvalue,
        OpCode::SetUpvalue,
        OpCode::GetProperty,
        OpCode::SetProperty,
        OpCode::Equal,
        OpCode::Greater,
        OpCode::Less,
        OpCode::Add,
        OpCode::Subtract,
        OpCode::Multiply,
        OpCode::Divide,
        OpCode::Modulo,
        OpCode::Not,
        OpCode::Negate,
        OpCode::Print,
        OpCode::Jump,
        OpCode::JumpIfFalse,
        OpCode::Loop,
        OpCode::Break,
        OpCode::Continue,
        OpCode::Call,
        OpCode::Construct,
        OpCode::Closure,
        OpCode::CloseUpvalue,
        OpCode::Return,
        OpCode::Struct,
        OpCode::Array,
        OpCode::Map,
        OpCode::ArrayGet,
        OpCode::ArraySet,
        OpCode::ArraySlice,
    ];

    /// Decode an opcode byte.
    #[inline]
    pub fn from_byte(byte: u8) -> Option<OpCode> {
        Self::ALL.get(byte as usize).copied()
    }

    /// Number of fixed operand bytes that follow the opcode.
    ///
    /// `Closure` and `Struct` are followed by further variable-length
    /// descriptor bytes; this counts only their fixed prefix.
    #[inline]
    pub fn operand_bytes(self) -> usize {
        match self {
            OpCode::Constant
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::GetGlobal
            | OpCode::DefineGlobal
            | OpCode::SetGlobal
            | OpCode::GetUpvalue
            | OpCode::SetUpvalue
            | OpCode::GetProperty
            | OpCode::SetProperty
            | OpCode::Call
            | OpCode::Closure
            | OpCode::Array
            | OpCode::Map => 1,

            OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::Loop
            | OpCode::Break
            | OpCode::Continue
            | OpCode::Construct
            | OpCode::Struct => 2,

            OpCode::Null
            | OpCode::True
            | OpCode::False
            | OpCode::Pop
            | OpCode::Equal
            | OpCode::Greater
            | OpCode::Less
            | OpCode::Add
            | OpCode::Subtract
            | OpCode::Multiply
            | OpCode::Divide
            | OpCode::Modulo
            | OpCode::Not
            | OpCode::Negate
            | OpCode::Print
            | OpCode::CloseUpvalue
            | OpCode::Return
            | OpCode::ArrayGet
            | OpCode::ArraySet
            | OpCode::ArraySlice => 0,
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        op as u8
    }
}
