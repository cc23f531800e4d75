//! The instruction set. Opcodes are one byte; operand widths are fixed
//! per opcode (u8 everywhere except jump targets, which are big-endian
//! u16 absolute addresses within the current code object).

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    /// Terminate; return top of stack.
    Halt = 0x00,
    /// u8 index: push constant pool entry.
    Const = 0x01,

    // Arithmetic. ADD also concatenates two strings.
    Add = 0x02,
    Sub = 0x03,
    Mul = 0x04,
    Div = 0x05,
    /// u8 op in 0..=5 (`<`, `>`, `==`, `<=`, `>=`, `!=`).
    Compare = 0x06,

    // Control flow.
    JmpIfFalse = 0x07,
    Jmp = 0x08,

    // Global slots (u8 index). SET leaves the value on the stack.
    GetGlobal = 0x09,
    SetGlobal = 0x0A,

    Pop = 0x0B,
    // Frame slots relative to the base pointer (u8 index).
    GetLocal = 0x0C,
    SetLocal = 0x0D,
    /// u8 n: pop n values while preserving the top-of-stack result.
    ScopeExit = 0x0E,

    /// u8 argc: call the value at stack depth argc.
    Call = 0x0F,
    Return = 0x10,

    // Closure cells (u8 index into the current function's cells).
    GetCell = 0x11,
    SetCell = 0x12,
    /// Push the cell itself rather than its contents, for capturing.
    LoadCell = 0x13,
    /// u8 capture count: pop a code object and that many cells, push a
    /// new function.
    MakeFunction = 0x14,

    /// Pop a class; push its constructor and a fresh instance.
    New = 0x15,
    // Property access; the name is a string constant (u8 index).
    GetProp = 0x16,
    SetProp = 0x17,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Opcode::*;
        let name = match self {
            Halt => "HALT",
            Const => "CONST",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Compare => "COMPARE",
            JmpIfFalse => "JMP_IF_FALSE",
            Jmp => "JMP",
            GetGlobal => "GET_GLOBAL",
            SetGlobal => "SET_GLOBAL",
            Pop => "POP",
            GetLocal => "GET_LOCAL",
            SetLocal => "SET_LOCAL",
            ScopeExit => "SCOPE_EXIT",
            Call => "CALL",
            Return => "RETURN",
            GetCell => "GET_CELL",
            SetCell => "SET_CELL",
            LoadCell => "LOAD_CELL",
            MakeFunction => "MAKE_FUNCTION",
            New => "NEW",
            GetProp => "GET_PROP",
            SetProp => "SET_PROP",
        };
        f.pad(name)
    }
}

/// Source-level spelling of a COMPARE operand, for the disassembler.
pub fn compare_op_name(op: u8) -> &'static str {
    match op {
        0 => "<",
        1 => ">",
        2 => "==",
        3 => "<=",
        4 => ">=",
        5 => "!=",
        _ => "?",
    }
}
