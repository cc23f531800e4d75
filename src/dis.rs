//! Disassembly listing for compiled code objects. A read-only debug
//! view, emitted through the `log` facade after compilation; execution
//! never consults it.

use std::fmt::Write;

use crate::vm::{compare_op_name, GlobalTable, Heap, ObjectId, Opcode};

pub fn disassemble(heap: &Heap, globals: &GlobalTable, code_id: ObjectId) -> String {
    let code = match heap.code(code_id) {
        Ok(code) => code,
        Err(_) => return "<not a code object>".to_owned(),
    };

    let mut out = String::new();
    let _ = writeln!(out, "== {} (arity {}) ==", code.name, code.arity);
    if !code.cell_names.is_empty() {
        let _ = writeln!(
            out,
            "cells: {:?} (free: {})",
            code.cell_names, code.free_count
        );
    }

    let bytes = &code.code;
    let mut ip = 0;
    while ip < bytes.len() {
        let offset = ip;
        let byte = bytes[ip];
        ip += 1;

        let opcode = match Opcode::try_from(byte) {
            Ok(opcode) => opcode,
            Err(_) => {
                let _ = writeln!(out, "{offset:04} ??            {byte:#04x}");
                continue;
            }
        };

        let _ = write!(out, "{offset:04} {opcode:<13}");
        match opcode {
            Opcode::Const | Opcode::GetProp | Opcode::SetProp => {
                let index = operand_u8(bytes, &mut ip);
                let annotation = code
                    .constants
                    .get(index as usize)
                    .map(|constant| heap.format_value(constant))
                    .unwrap_or_else(|| "<bad index>".to_owned());
                let _ = write!(out, "{index} ({annotation})");
            }
            Opcode::Compare => {
                let op = operand_u8(bytes, &mut ip);
                let _ = write!(out, "{op} ({})", compare_op_name(op));
            }
            Opcode::Jmp | Opcode::JmpIfFalse => {
                let target = operand_u16(bytes, &mut ip);
                let _ = write!(out, "{target:04}");
            }
            Opcode::GetGlobal | Opcode::SetGlobal => {
                let index = operand_u8(bytes, &mut ip);
                let name = globals.name(index as usize).unwrap_or("<bad index>");
                let _ = write!(out, "{index} ({name})");
            }
            Opcode::GetCell | Opcode::SetCell | Opcode::LoadCell => {
                let index = operand_u8(bytes, &mut ip);
                let name = code
                    .cell_names
                    .get(index as usize)
                    .map(String::as_str)
                    .unwrap_or("<bad index>");
                let _ = write!(out, "{index} ({name})");
            }
            Opcode::GetLocal
            | Opcode::SetLocal
            | Opcode::ScopeExit
            | Opcode::Call
            | Opcode::MakeFunction => {
                let index = operand_u8(bytes, &mut ip);
                let _ = write!(out, "{index}");
            }
            Opcode::Halt
            | Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Pop
            | Opcode::Return
            | Opcode::New => {}
        }
        let _ = writeln!(out);
    }
    out
}

fn operand_u8(bytes: &[u8], ip: &mut usize) -> u8 {
    let byte = bytes.get(*ip).copied().unwrap_or(0);
    *ip += 1;
    byte
}

fn operand_u16(bytes: &[u8], ip: &mut usize) -> u16 {
    let hi = operand_u8(bytes, ip) as u16;
    let lo = operand_u8(bytes, ip) as u16;
    (hi << 8) | lo
}
