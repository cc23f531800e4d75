//! The virtual machine: a fetch/decode/execute loop over bytecode, an
//! operand stack of fixed capacity, and a call stack of frames. A frame
//! saves the caller's instruction pointer, base pointer, and function;
//! slot 0 of a frame is the callee itself, which is also how a function
//! reaches itself for recursion.

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, log_enabled, warn, Level};

use crate::compiler::Compiler;
use crate::dis;
use crate::parser::Parser;
use crate::result::ExeResult;
use crate::util::Stack;

use super::gc::Collector;
use super::globals::GlobalTable;
use super::heap::{Heap, HeapData};
use super::objects::{Function, Instance, Native};
use super::opcode::Opcode;
use super::result::{RuntimeErr, RuntimeErrKind, RuntimeResult};
use super::value::{ObjectId, Value};

/// Operand stack capacity.
pub const STACK_LIMIT: usize = 512;

/// Initial collection trigger, in heap bytes. Doubled whenever a
/// collection fails to get back under it.
pub const GC_THRESHOLD: usize = 1024;

/// Saved machine state restored by RETURN.
struct Frame {
    return_addr: usize,
    saved_bp: usize,
    saved_fn: ObjectId,
}

pub struct VM {
    heap: Heap,
    globals: GlobalTable,
    collector: Collector,
    stack: Stack<Value>,
    call_stack: Stack<Frame>,
    /// Instruction pointer, an offset into the current code object.
    ip: usize,
    /// Base pointer: the stack index of the current frame's slot 0.
    bp: usize,
    /// The currently running function.
    func: ObjectId,
    /// Compile-time objects that stay alive for the VM's lifetime.
    constant_roots: Vec<ObjectId>,
    gc_threshold: usize,
    halt_flag: Arc<AtomicBool>,
}

impl Default for VM {
    fn default() -> Self {
        VM::new()
    }
}

impl VM {
    pub fn new() -> Self {
        let mut vm = VM {
            heap: Heap::new(),
            globals: GlobalTable::new(),
            collector: Collector::new(),
            stack: Stack::with_capacity(STACK_LIMIT),
            call_stack: Stack::new(),
            ip: 0,
            bp: 0,
            func: 0,
            constant_roots: vec![],
            gc_threshold: GC_THRESHOLD,
            halt_flag: Arc::new(AtomicBool::new(false)),
        };
        vm.set_global_variables();
        vm
    }

    /// Compile and run a program, returning the value of its final
    /// top-level expression.
    pub fn exec(&mut self, source: &str) -> ExeResult {
        // The newline keeps a trailing line comment in the source from
        // swallowing the closing paren.
        let ast = Parser::parse(&format!("(begin {source}\n)"))?;

        let program = Compiler::new(&mut self.heap, &mut self.globals).compile(&ast)?;
        self.constant_roots.extend(program.constant_objects.iter().copied());

        if log_enabled!(Level::Debug) {
            for &code_id in &program.code_objects {
                debug!("\n{}", dis::disassemble(&self.heap, &self.globals, code_id));
            }
        }

        self.stack.clear();
        self.call_stack.clear();
        self.func = program.main;
        self.ip = 0;
        self.bp = 0;

        Ok(self.eval()?)
    }

    // Host hooks ------------------------------------------------------

    pub fn add_const(&mut self, name: &str, value: f64) {
        self.globals.add_const(name, value);
    }

    pub fn add_native_function<F>(&mut self, name: &str, func: F, arity: usize)
    where
        F: Fn(&mut VM) -> RuntimeResult + 'static,
    {
        let native = Native { name: name.to_owned(), arity, func: Rc::new(func) };
        let id = self.heap.alloc(HeapData::Native(native));
        self.globals.define_value(name, Value::Object(id));
    }

    /// Wire SIGINT to the halt flag so a stuck program can be stopped
    /// from the terminal. The flag is checked once per dispatched
    /// instruction.
    pub fn install_sigint_handler(&self) {
        let flag = Arc::clone(&self.halt_flag);
        if let Err(err) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            warn!("Could not install SIGINT handler: {err}");
        }
    }

    pub fn format_value(&self, value: &Value) -> String {
        self.heap.format_value(value)
    }

    pub fn bytes_allocated(&self) -> usize {
        self.heap.bytes_allocated()
    }

    pub fn object_count(&self) -> usize {
        self.heap.object_count()
    }

    fn set_global_variables(&mut self) {
        self.add_native_function(
            "square",
            |vm| {
                let x = vm.peek(0)?.as_number()?;
                vm.push(Value::Number(x * x))
            },
            1,
        );
        self.add_native_function(
            "sum",
            |vm| {
                let b = vm.peek(0)?.as_number()?;
                let a = vm.peek(1)?.as_number()?;
                vm.push(Value::Number(a + b))
            },
            2,
        );
        self.add_const("x", 10.0);
        self.add_const("y", 20.0);
    }

    // Dispatch loop ---------------------------------------------------

    fn eval(&mut self) -> Result<Value, RuntimeErr> {
        loop {
            if self.halt_flag.load(Ordering::Relaxed) {
                return Err(RuntimeErr::new(RuntimeErrKind::Interrupted));
            }

            let byte = self.fetch_u8()?;
            let opcode = Opcode::try_from(byte)
                .map_err(|_| RuntimeErr::new(RuntimeErrKind::UnknownOpcode(byte)))?;

            match opcode {
                Opcode::Halt => return self.pop(),
                Opcode::Const => {
                    let index = self.fetch_u8()? as usize;
                    let constant = self.constant(index)?;
                    self.push(constant)?;
                }
                Opcode::Add => self.handle_add()?,
                Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    let b = self.pop()?.as_number()?;
                    let a = self.pop()?.as_number()?;
                    let result = match opcode {
                        Opcode::Sub => a - b,
                        Opcode::Mul => a * b,
                        _ => a / b,
                    };
                    self.push(Value::Number(result))?;
                }
                Opcode::Compare => self.handle_compare()?,
                Opcode::JmpIfFalse => {
                    let addr = self.fetch_u16()?;
                    let cond = self.pop()?.as_boolean()?;
                    if !cond {
                        self.ip = addr as usize;
                    }
                }
                Opcode::Jmp => {
                    let addr = self.fetch_u16()?;
                    self.ip = addr as usize;
                }
                Opcode::GetGlobal => {
                    let index = self.fetch_u8()? as usize;
                    let value = self.globals.get(index)?;
                    self.push(value)?;
                }
                Opcode::SetGlobal => {
                    let index = self.fetch_u8()? as usize;
                    let value = self.peek(0)?;
                    self.globals.set(index, value)?;
                }
                Opcode::Pop => {
                    self.pop()?;
                }
                Opcode::GetLocal => {
                    let index = self.fetch_u8()? as usize;
                    let value = self.local(index)?;
                    self.push(value)?;
                }
                Opcode::SetLocal => {
                    let index = self.fetch_u8()? as usize;
                    let value = self.peek(0)?;
                    self.set_local(index, value)?;
                }
                Opcode::ScopeExit => {
                    let count = self.fetch_u8()? as usize;
                    let result = self.pop()?;
                    self.pop_n(count)?;
                    self.push(result)?;
                }
                Opcode::Call => self.handle_call()?,
                Opcode::Return => {
                    let frame = self
                        .call_stack
                        .pop()
                        .ok_or_else(|| RuntimeErr::new(RuntimeErrKind::EmptyCallStack))?;
                    self.ip = frame.return_addr;
                    self.bp = frame.saved_bp;
                    self.func = frame.saved_fn;
                }
                Opcode::GetCell => {
                    let index = self.fetch_u8()? as usize;
                    let cell = self.cell_at(index)?;
                    let value = self.heap.cell_value(cell)?;
                    self.push(value)?;
                }
                Opcode::SetCell => self.handle_set_cell()?,
                Opcode::LoadCell => {
                    let index = self.fetch_u8()? as usize;
                    let cell = self.cell_at(index)?;
                    self.push(Value::Object(cell))?;
                }
                Opcode::MakeFunction => self.handle_make_function()?,
                Opcode::New => self.handle_new()?,
                Opcode::GetProp => self.handle_get_prop()?,
                Opcode::SetProp => self.handle_set_prop()?,
            }
        }
    }

    // Handlers --------------------------------------------------------

    fn handle_add(&mut self) -> RuntimeResult {
        let b = self.pop()?;
        let a = self.pop()?;
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => self.push(Value::Number(a + b)),
            (Value::Object(a_id), Value::Object(b_id))
                if matches!(self.heap.data(a_id), HeapData::Str(_))
                    && matches!(self.heap.data(b_id), HeapData::Str(_)) =>
            {
                let joined =
                    format!("{}{}", self.heap.str_value(a_id)?, self.heap.str_value(b_id)?);
                self.maybe_gc();
                let id = self.heap.alloc(HeapData::Str(joined));
                self.push(Value::Object(id))
            }
            (a, b) => Err(RuntimeErr::type_err(format!(
                "cannot add {} and {}",
                self.value_kind(&a),
                self.value_kind(&b)
            ))),
        }
    }

    fn handle_compare(&mut self) -> RuntimeResult {
        let op = self.fetch_u8()?;
        let b = self.pop()?;
        let a = self.pop()?;
        let result = match (a, b) {
            (Value::Number(a), Value::Number(b)) => compare_values(op, a, b)?,
            (Value::Object(a_id), Value::Object(b_id)) => {
                let a_str = self.heap.str_value(a_id)?;
                let b_str = self.heap.str_value(b_id)?;
                compare_values(op, a_str, b_str)?
            }
            (a, b) => {
                return Err(RuntimeErr::type_err(format!(
                    "cannot compare {} and {}",
                    self.value_kind(&a),
                    self.value_kind(&b)
                )))
            }
        };
        self.push(Value::Boolean(result))
    }

    fn handle_call(&mut self) -> RuntimeResult {
        let argc = self.fetch_u8()? as usize;
        let callee = self.peek(argc)?;
        let callee_id = match callee {
            Value::Object(id) => id,
            other => {
                return Err(RuntimeErr::type_err(format!(
                    "cannot call {}",
                    self.value_kind(&other)
                )))
            }
        };

        match self.heap.data(callee_id) {
            HeapData::Native(_) => {
                let func = Rc::clone(&self.heap.native(callee_id)?.func);
                func(self)?;
                // The native left its result on top; tuck it under the
                // callee and arguments, then discard those.
                let result = self.pop()?;
                self.pop_n(argc + 1)?;
                self.push(result)
            }
            HeapData::Function(_) => {
                let code_id = self.heap.function(callee_id)?.code;
                let free_count = self.heap.code(code_id)?.free_count;
                // Drop own cells left over from a previous activation;
                // the prologue re-creates them.
                self.heap.function_mut(callee_id)?.cells.truncate(free_count);

                self.call_stack.push(Frame {
                    return_addr: self.ip,
                    saved_bp: self.bp,
                    saved_fn: self.func,
                });
                self.func = callee_id;
                self.bp = self.stack.size() - argc - 1;
                self.ip = 0;
                Ok(())
            }
            _ => Err(RuntimeErr::type_err(format!(
                "cannot call {}",
                self.heap.kind_name(callee_id)
            ))),
        }
    }

    fn handle_set_cell(&mut self) -> RuntimeResult {
        let index = self.fetch_u8()? as usize;
        let value = self.peek(0)?;
        let cells_len = self.heap.function(self.func)?.cells.len();
        if index < cells_len {
            let cell = self.heap.function(self.func)?.cells[index];
            self.heap.set_cell_value(cell, value)
        } else {
            // First write to a promoted variable: the cell is created
            // here, in cell-name order.
            self.maybe_gc();
            let cell = self.heap.alloc(HeapData::Cell(value));
            self.heap.function_mut(self.func)?.cells.push(cell);
            Ok(())
        }
    }

    fn handle_make_function(&mut self) -> RuntimeResult {
        let capture_count = self.fetch_u8()? as usize;
        self.maybe_gc();
        let code_id = self.pop()?.as_object()?;
        self.heap.code(code_id)?;

        let mut cells = Vec::with_capacity(capture_count);
        for _ in 0..capture_count {
            let cell = self.pop()?.as_object()?;
            self.heap.cell_value(cell)?;
            cells.push(cell);
        }
        // Captures were pushed in cell-name order, so popping yields
        // them reversed.
        cells.reverse();

        let id = self.heap.alloc(HeapData::Function(Function { code: code_id, cells }));
        self.push(Value::Object(id))
    }

    fn handle_new(&mut self) -> RuntimeResult {
        self.maybe_gc();
        let class_value = self.pop()?;
        let class_id = class_value.as_object().map_err(|_| {
            RuntimeErr::type_err(format!("new requires a class, got {}", self.value_kind(&class_value)))
        })?;
        self.heap.class(class_id)?;

        let ctor = self.heap.class_prop(class_id, "constructor")?;
        let instance = self
            .heap
            .alloc(HeapData::Instance(Instance { class: class_id, properties: Default::default() }));

        // Constructor argument code follows, then CALL; the instance
        // becomes the constructor's first argument.
        self.push(ctor)?;
        self.push(Value::Object(instance))
    }

    fn handle_get_prop(&mut self) -> RuntimeResult {
        let name = self.prop_name()?;
        let target = self.pop()?;
        let id = target.as_object().map_err(|_| {
            RuntimeErr::type_err(format!(
                "cannot read property {name} of {}",
                self.value_kind(&target)
            ))
        })?;
        let value = match self.heap.data(id) {
            HeapData::Instance(_) => self.heap.instance_prop(id, &name)?,
            HeapData::Class(_) => self.heap.class_prop(id, &name)?,
            _ => {
                return Err(RuntimeErr::type_err(format!(
                    "cannot read property {name} of {}",
                    self.heap.kind_name(id)
                )))
            }
        };
        self.push(value)
    }

    fn handle_set_prop(&mut self) -> RuntimeResult {
        let name = self.prop_name()?;
        let target = self.pop()?;
        let value = self.pop()?;
        let id = target.as_object().map_err(|_| {
            RuntimeErr::type_err(format!(
                "cannot assign property {name} on {}",
                self.value_kind(&target)
            ))
        })?;
        if !matches!(self.heap.data(id), HeapData::Instance(_)) {
            return Err(RuntimeErr::type_err(format!(
                "property assignment requires an instance, got {}",
                self.heap.kind_name(id)
            )));
        }
        self.heap.instance_mut(id)?.properties.insert(name, value);
        self.push(value)
    }

    /// Property names are string constants; the operand is the constant
    /// pool index.
    fn prop_name(&mut self) -> Result<String, RuntimeErr> {
        let index = self.fetch_u8()? as usize;
        let constant = self.constant(index)?;
        Ok(self.heap.str_value(constant.as_object()?)?.to_owned())
    }

    // Fetch -----------------------------------------------------------

    fn fetch_u8(&mut self) -> Result<u8, RuntimeErr> {
        let code_id = self.heap.function(self.func)?.code;
        let code = self.heap.code(code_id)?;
        let byte = *code
            .code
            .get(self.ip)
            .ok_or_else(|| RuntimeErr::new(RuntimeErrKind::IpOutOfBounds(self.ip)))?;
        self.ip += 1;
        Ok(byte)
    }

    fn fetch_u16(&mut self) -> Result<u16, RuntimeErr> {
        let hi = self.fetch_u8()? as u16;
        let lo = self.fetch_u8()? as u16;
        Ok((hi << 8) | lo)
    }

    fn constant(&self, index: usize) -> Result<Value, RuntimeErr> {
        let code_id = self.heap.function(self.func)?.code;
        let code = self.heap.code(code_id)?;
        code.constants
            .get(index)
            .copied()
            .ok_or_else(|| RuntimeErr::new(RuntimeErrKind::InvalidConstIndex(index)))
    }

    fn cell_at(&self, index: usize) -> Result<ObjectId, RuntimeErr> {
        self.heap
            .function(self.func)?
            .cells
            .get(index)
            .copied()
            .ok_or_else(|| RuntimeErr::new(RuntimeErrKind::InvalidCellIndex(index)))
    }

    fn local(&self, index: usize) -> Result<Value, RuntimeErr> {
        self.stack
            .get(self.bp + index)
            .copied()
            .ok_or_else(|| RuntimeErr::new(RuntimeErrKind::InvalidLocalIndex(index)))
    }

    fn set_local(&mut self, index: usize, value: Value) -> RuntimeResult {
        if self.stack.set(self.bp + index, value) {
            Ok(())
        } else {
            Err(RuntimeErr::new(RuntimeErrKind::InvalidLocalIndex(index)))
        }
    }

    // Operand stack ---------------------------------------------------

    pub fn push(&mut self, value: Value) -> RuntimeResult {
        if self.stack.size() == STACK_LIMIT {
            return Err(RuntimeErr::new(RuntimeErrKind::StackOverflow));
        }
        self.stack.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Value, RuntimeErr> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeErr::new(RuntimeErrKind::StackUnderflow))
    }

    /// Get a value `offset` entries below the top without popping.
    pub fn peek(&self, offset: usize) -> Result<Value, RuntimeErr> {
        self.stack
            .peek_at(offset)
            .copied()
            .ok_or_else(|| RuntimeErr::new(RuntimeErrKind::StackUnderflow))
    }

    fn pop_n(&mut self, count: usize) -> RuntimeResult {
        let size = self.stack.size();
        if count > size {
            return Err(RuntimeErr::new(RuntimeErrKind::StackUnderflow));
        }
        self.stack.truncate(size - count);
        Ok(())
    }

    fn value_kind(&self, value: &Value) -> &'static str {
        match value {
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Object(id) => self.heap.kind_name(*id),
        }
    }

    // Garbage collection ----------------------------------------------

    /// Gate a heap-allocating opcode: collect when the byte total has
    /// crossed the threshold. Called while operands are still on the
    /// stack so everything being worked on counts as a root.
    fn maybe_gc(&mut self) {
        if self.heap.bytes_allocated() < self.gc_threshold {
            return;
        }
        let roots = self.gc_roots();
        if roots.is_empty() {
            return;
        }
        debug!(
            "gc: start ({} objects, {} bytes)",
            self.heap.object_count(),
            self.heap.bytes_allocated()
        );
        let stats = self.collector.collect(&mut self.heap, roots);
        debug!(
            "gc: done ({} live, {} freed, {} bytes)",
            stats.live,
            stats.freed,
            self.heap.bytes_allocated()
        );
        if self.heap.bytes_allocated() >= self.gc_threshold {
            self.gc_threshold *= 2;
        }
    }

    /// Roots are everything reachable without going through the heap:
    /// operand stack contents, compile-time constants, and globals. The
    /// running function and all callers are reachable through their
    /// stack slots (`bp[0]` is always the callee).
    fn gc_roots(&self) -> Vec<ObjectId> {
        let mut roots = vec![];
        for value in self.stack.iter() {
            if let Value::Object(id) = value {
                roots.push(*id);
            }
        }
        roots.extend(self.constant_roots.iter().copied());
        for var in self.globals.iter() {
            if let Value::Object(id) = var.value {
                roots.push(id);
            }
        }
        roots
    }
}

fn compare_values<T: PartialOrd>(op: u8, a: T, b: T) -> Result<bool, RuntimeErr> {
    let result = match op {
        0 => a < b,
        1 => a > b,
        2 => a == b,
        3 => a <= b,
        4 => a >= b,
        5 => a != b,
        _ => return Err(RuntimeErr::new(RuntimeErrKind::UnknownCompareOp(op))),
    };
    Ok(result)
}
