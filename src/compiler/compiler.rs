//! The bytecode compiler. Walks the analyzed expression tree and lowers
//! it into instruction bytes over per-function code objects, each with
//! its own constant pool. Functions without free variables become
//! compile-time constants; closures are built at runtime by capturing
//! cells from the enclosing frame.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;

use crate::parser::{Expr, ExprKind};
use crate::vm::{Class, Code, Function, GlobalTable, Heap, HeapData, ObjectId, Opcode, Value};

use super::result::{CompErr, CompErrKind, CompResult};
use super::scope::{Allocation, Analyzer, ScopeId, ScopeTree};

/// COMPARE operand bytes, keyed by source spelling.
pub(crate) static COMPARE_OPS: Lazy<HashMap<&'static str, u8>> = Lazy::new(|| {
    HashMap::from([("<", 0), (">", 1), ("==", 2), ("<=", 3), (">=", 4), ("!=", 5)])
});

/// Everything the VM needs from a compilation: the main function, the
/// compile-time objects that become permanent GC roots, and the code
/// objects (for disassembly).
#[derive(Debug)]
pub struct CompiledProgram {
    pub main: ObjectId,
    pub constant_objects: Vec<ObjectId>,
    pub code_objects: Vec<ObjectId>,
}

pub struct Compiler<'a> {
    heap: &'a mut Heap,
    globals: &'a mut GlobalTable,
    scopes: ScopeTree,
    scope_stack: Vec<ScopeId>,
    /// The code object currently being emitted into.
    co: ObjectId,
    code_objects: Vec<ObjectId>,
    constant_objects: IndexSet<ObjectId>,
    classes: IndexMap<String, ObjectId>,
    /// Set while compiling class members; methods are stored into this
    /// class rather than bound to a variable.
    current_class: Option<ObjectId>,
}

impl<'a> Compiler<'a> {
    pub fn new(heap: &'a mut Heap, globals: &'a mut GlobalTable) -> Self {
        Self {
            heap,
            globals,
            scopes: ScopeTree::new(),
            scope_stack: vec![],
            co: 0,
            code_objects: vec![],
            constant_objects: IndexSet::new(),
            classes: IndexMap::new(),
            current_class: None,
        }
    }

    /// Compile a top-level expression into a main function.
    pub fn compile(mut self, expr: &Expr) -> CompResult<CompiledProgram> {
        self.scopes = Analyzer::analyze(expr, self.globals)?;

        let main_co = self.create_code("main", 0);
        self.co = main_co;
        let main = self.heap.alloc(HeapData::Function(Function { code: main_co, cells: vec![] }));
        self.constant_objects.insert(main);

        self.gen(expr)?;
        self.emit_op(Opcode::Halt);

        Ok(CompiledProgram {
            main,
            constant_objects: self.constant_objects.into_iter().collect(),
            code_objects: self.code_objects,
        })
    }

    // Lowering --------------------------------------------------------

    fn gen(&mut self, expr: &Expr) -> CompResult<()> {
        match &expr.kind {
            ExprKind::Number(number) => {
                let index = self.numeric_const_idx(*number)?;
                self.emit_op(Opcode::Const);
                self.emit(index);
                Ok(())
            }
            ExprKind::Str(text) => {
                let index = self.string_const_idx(text)?;
                self.emit_op(Opcode::Const);
                self.emit(index);
                Ok(())
            }
            ExprKind::Symbol(name) => self.gen_symbol(name),
            ExprKind::List(children) => self.gen_list(expr, children),
        }
    }

    fn gen_symbol(&mut self, name: &str) -> CompResult<()> {
        if name == "true" || name == "false" {
            let index = self.boolean_const_idx(name == "true")?;
            self.emit_op(Opcode::Const);
            self.emit(index);
            return Ok(());
        }
        match self.allocation(name) {
            Some(Allocation::Local) => {
                let index =
                    self.co().local_index(name).ok_or_else(|| CompErr::reference(name))?;
                let index = self.local_u8(index)?;
                self.emit_op(Opcode::GetLocal);
                self.emit(index);
            }
            Some(Allocation::Cell) => {
                let index =
                    self.co().cell_index(name).ok_or_else(|| CompErr::reference(name))?;
                let index = self.cell_u8(index)?;
                self.emit_op(Opcode::GetCell);
                self.emit(index);
            }
            // Anything else must be a global, declared or predefined.
            _ => {
                let index =
                    self.globals.get_index(name).ok_or_else(|| CompErr::reference(name))?;
                let index = self.global_u8(index)?;
                self.emit_op(Opcode::GetGlobal);
                self.emit(index);
            }
        }
        Ok(())
    }

    fn gen_list(&mut self, expr: &Expr, children: &[Expr]) -> CompResult<()> {
        let Some(head) = children.first() else {
            return Err(CompErr::syntax("cannot compile an empty list"));
        };
        let Some(tag) = head.as_symbol() else {
            // The head is itself an expression, e.g. an immediately
            // invoked lambda.
            return self.gen_call(children);
        };
        match tag {
            "+" => self.gen_binary_op(children, Opcode::Add),
            "-" => self.gen_binary_op(children, Opcode::Sub),
            "*" => self.gen_binary_op(children, Opcode::Mul),
            "/" => self.gen_binary_op(children, Opcode::Div),
            tag if COMPARE_OPS.contains_key(tag) => {
                let op = COMPARE_OPS[tag];
                self.gen(form_child(children, 1, tag)?)?;
                self.gen(form_child(children, 2, tag)?)?;
                self.emit_op(Opcode::Compare);
                self.emit(op);
                Ok(())
            }
            "if" => self.gen_if(children),
            "while" => self.gen_while(children),
            "for" => self.gen_for(children),
            "var" => self.gen_var(children),
            "set" => self.gen_set(children),
            "begin" => self.gen_begin(expr, children),
            "def" => self.gen_def(expr, children),
            "lambda" => {
                let params = form_child(children, 1, "lambda")?;
                let body = form_child(children, 2, "lambda")?;
                self.compile_function(expr, "lambda", params, body)
            }
            "class" => self.gen_class(children),
            "new" => self.gen_new(children),
            "prop" => self.gen_prop(children),
            "super" => self.gen_super(children),
            _ => self.gen_call(children),
        }
    }

    /// Operands evaluate left to right, then the operator byte.
    fn gen_binary_op(&mut self, children: &[Expr], op: Opcode) -> CompResult<()> {
        self.gen(form_child(children, 1, "binary op")?)?;
        self.gen(form_child(children, 2, "binary op")?)?;
        self.emit_op(op);
        Ok(())
    }

    /// `(if <test> <consequent> <alternate>)`. A missing alternate
    /// evaluates to false so the branch always produces a value.
    fn gen_if(&mut self, children: &[Expr]) -> CompResult<()> {
        self.gen(form_child(children, 1, "if")?)?;

        self.emit_op(Opcode::JmpIfFalse);
        self.emit_u16(0);
        let else_jmp = self.offset() - 2;

        self.gen(form_child(children, 2, "if")?)?;
        self.emit_op(Opcode::Jmp);
        self.emit_u16(0);
        let end_jmp = self.offset() - 2;

        let else_addr = self.offset();
        self.patch_jump(else_jmp, else_addr)?;

        match children.get(3) {
            Some(alternate) => self.gen(alternate)?,
            None => {
                let index = self.boolean_const_idx(false)?;
                self.emit_op(Opcode::Const);
                self.emit(index);
            }
        }

        let end_addr = self.offset();
        self.patch_jump(end_jmp, end_addr)
    }

    /// `(while <test> <body>)`. The body's value is discarded every
    /// iteration so loops cannot grow the stack; the loop expression
    /// itself evaluates to false.
    fn gen_while(&mut self, children: &[Expr]) -> CompResult<()> {
        let loop_start = self.offset();
        self.gen(form_child(children, 1, "while")?)?;

        self.emit_op(Opcode::JmpIfFalse);
        self.emit_u16(0);
        let end_jmp = self.offset() - 2;

        self.gen(form_child(children, 2, "while")?)?;
        self.emit_op(Opcode::Pop);

        self.emit_jump_back(loop_start)?;
        let end_addr = self.offset();
        self.patch_jump(end_jmp, end_addr)?;

        let index = self.boolean_const_idx(false)?;
        self.emit_op(Opcode::Const);
        self.emit(index);
        Ok(())
    }

    /// `(for <init> <test> <step> <body>)`. The step runs after the
    /// body, before the jump back to the test.
    fn gen_for(&mut self, children: &[Expr]) -> CompResult<()> {
        let init = form_child(children, 1, "for")?;
        self.gen(init)?;
        // A var init leaves its slot on the stack; anything else is a
        // statement whose value is discarded.
        if !init.is_tagged("var") && !self.is_global_set(init) {
            self.emit_op(Opcode::Pop);
        }

        let loop_start = self.offset();
        self.gen(form_child(children, 2, "for")?)?;

        self.emit_op(Opcode::JmpIfFalse);
        self.emit_u16(0);
        let end_jmp = self.offset() - 2;

        self.gen(form_child(children, 4, "for")?)?;
        self.emit_op(Opcode::Pop);
        self.gen(form_child(children, 3, "for")?)?;
        self.emit_op(Opcode::Pop);

        self.emit_jump_back(loop_start)?;
        let end_addr = self.offset();
        self.patch_jump(end_jmp, end_addr)?;

        let index = self.boolean_const_idx(false)?;
        self.emit_op(Opcode::Const);
        self.emit(index);
        Ok(())
    }

    /// `(var <name> <init>)`. The analyzer's verdict for the name picks
    /// the storage: a global slot, a heap cell, or a stack local whose
    /// slot is the init value itself.
    fn gen_var(&mut self, children: &[Expr]) -> CompResult<()> {
        let name = form_symbol(children, 1, "var")?;
        let init = form_child(children, 2, "var")?;

        // `(var f (lambda ...))` compiles the lambda under the declared
        // name so the function can refer to itself.
        if init.is_tagged("lambda") {
            let lambda = init.as_list().expect("lambda is a list");
            let params = form_child(lambda, 1, "lambda")?;
            let body = form_child(lambda, 2, "lambda")?;
            self.compile_function(init, name, params, body)?;
        } else {
            self.gen(init)?;
        }

        match self.allocation(name) {
            Some(Allocation::Cell) => {
                let index = self.co_mut().add_cell_name(name);
                let index = self.cell_u8(index)?;
                self.emit_op(Opcode::SetCell);
                self.emit(index);
                // The value lives on the heap now.
                self.emit_op(Opcode::Pop);
            }
            Some(Allocation::Local) => {
                self.co_mut().add_local(name);
                let index =
                    self.co().local_index(name).ok_or_else(|| CompErr::reference(name))?;
                let index = self.local_u8(index)?;
                self.emit_op(Opcode::SetLocal);
                self.emit(index);
            }
            _ => {
                self.globals.define(name);
                let index = self.globals.get_index(name).expect("global just defined");
                let index = self.global_u8(index)?;
                self.emit_op(Opcode::SetGlobal);
                self.emit(index);
            }
        }
        Ok(())
    }

    /// `(set <name> <value>)` or `(set (prop <obj> <name>) <value>)`.
    /// Assignment is an expression: the value stays on the stack.
    fn gen_set(&mut self, children: &[Expr]) -> CompResult<()> {
        let target = form_child(children, 1, "set")?;
        let value = form_child(children, 2, "set")?;

        if target.is_tagged("prop") {
            let prop = target.as_list().expect("prop is a list");
            self.gen(value)?;
            self.gen(form_child(prop, 1, "prop")?)?;
            let index = self.string_const_idx(form_symbol(prop, 2, "prop")?)?;
            self.emit_op(Opcode::SetProp);
            self.emit(index);
            return Ok(());
        }

        let name = target
            .as_symbol()
            .ok_or_else(|| CompErr::syntax("set expects a name or property target"))?;
        self.gen(value)?;
        match self.allocation(name) {
            Some(Allocation::Local) => {
                let index =
                    self.co().local_index(name).ok_or_else(|| CompErr::reference(name))?;
                let index = self.local_u8(index)?;
                self.emit_op(Opcode::SetLocal);
                self.emit(index);
            }
            Some(Allocation::Cell) => {
                let index =
                    self.co().cell_index(name).ok_or_else(|| CompErr::reference(name))?;
                let index = self.cell_u8(index)?;
                self.emit_op(Opcode::SetCell);
                self.emit(index);
            }
            _ => {
                let index =
                    self.globals.get_index(name).ok_or_else(|| CompErr::reference(name))?;
                let index = self.global_u8(index)?;
                self.emit_op(Opcode::SetGlobal);
                self.emit(index);
            }
        }
        Ok(())
    }

    /// `(begin e1 ... eN)`: a block evaluating to its last expression.
    /// Intermediate results are popped; local declarations are not,
    /// since their stack value is the local's slot.
    fn gen_begin(&mut self, expr: &Expr, children: &[Expr]) -> CompResult<()> {
        let scope = self
            .scopes
            .scope_of(expr.id)
            .ok_or_else(|| CompErr::syntax("block was not analyzed"))?;
        self.scope_stack.push(scope);
        self.block_enter();

        let body = &children[1..];
        if body.is_empty() {
            let index = self.boolean_const_idx(false)?;
            self.emit_op(Opcode::Const);
            self.emit(index);
        }
        for (i, child) in body.iter().enumerate() {
            let is_last = i == body.len() - 1;
            // Declarations stay: their stack value is the new local's
            // slot (or, at the top level, inert).
            let is_decl = child.is_tagged("var") || child.is_tagged("def");
            self.gen(child)?;
            if is_last && is_decl {
                // A trailing declaration's stack value is its slot;
                // re-read the variable so the block result is separate.
                let list = child.as_list().expect("declaration is a list");
                let name = form_symbol(list, 1, "declaration")?;
                self.gen_symbol(name)?;
            } else if !is_last && !is_decl && !self.is_global_set(child) {
                self.emit_op(Opcode::Pop);
            }
        }

        self.block_exit()?;
        self.scope_stack.pop();
        Ok(())
    }

    /// `(def <name> <params> <body>)`: sugar for binding a lambda to a
    /// name. Inside a class body the function is stored as a method
    /// instead of being bound.
    fn gen_def(&mut self, expr: &Expr, children: &[Expr]) -> CompResult<()> {
        let name = form_symbol(children, 1, "def")?;
        let params = form_child(children, 2, "def")?;
        let body = form_child(children, 3, "def")?;

        self.compile_function(expr, name, params, body)?;

        if self.current_class.is_some() {
            return Ok(());
        }
        if self.is_global_scope() {
            self.globals.define(name);
            let index = self.globals.get_index(name).expect("global just defined");
            let index = self.global_u8(index)?;
            self.emit_op(Opcode::SetGlobal);
            self.emit(index);
        } else {
            self.co_mut().add_local(name);
            let index =
                self.co().local_index(name).ok_or_else(|| CompErr::reference(name))?;
            let index = self.local_u8(index)?;
            self.emit_op(Opcode::SetLocal);
            self.emit(index);
        }
        Ok(())
    }

    /// Compile a function body into its own code object. The scope
    /// record decides the cell layout: free names first (captured at
    /// closure creation), then own cells (created by SET_CELL).
    fn compile_function(
        &mut self,
        node: &Expr,
        name: &str,
        params: &Expr,
        body: &Expr,
    ) -> CompResult<()> {
        let scope = self
            .scopes
            .scope_of(node.id)
            .ok_or_else(|| CompErr::syntax(format!("function {name} was not analyzed")))?;
        self.scope_stack.push(scope);

        let params = form_list(params, "parameter list")?;
        let arity = params.len();
        if arity + 1 > u8::MAX as usize {
            return Err(CompErr::new(CompErrKind::TooManyArgs(arity)));
        }

        let free: Vec<String> = self.scopes.get(scope).free.iter().cloned().collect();
        let cell: Vec<String> = self.scopes.get(scope).cell.iter().cloned().collect();

        let prev_co = self.co;
        let code_id = self.create_code(name, arity);
        {
            let code = self.heap.code_mut(code_id).expect("new code object");
            code.free_count = free.len();
            code.cell_names.extend(free.iter().cloned());
            code.cell_names.extend(cell.iter().cloned());
        }
        // The code object becomes a constant of the enclosing unit.
        let code_const = self.co_mut().add_const(Value::Object(code_id));

        self.co = code_id;
        // Slot 0 is the function itself, then the parameters.
        self.co_mut().add_local(name);
        for param in params {
            let param = param
                .as_symbol()
                .ok_or_else(|| CompErr::syntax("parameters must be symbols"))?;
            self.co_mut().add_local(param);
            // A captured parameter's initial value moves to its cell.
            if let Some(index) = self.co().cell_index(param) {
                let index = self.cell_u8(index)?;
                self.emit_op(Opcode::SetCell);
                self.emit(index);
            }
        }

        self.gen(body)?;

        // A block body cleans up after itself on exit; otherwise pop the
        // arguments and the callee slot here.
        if !body.is_tagged("begin") {
            self.emit_op(Opcode::ScopeExit);
            self.emit((arity + 1) as u8);
        }
        self.emit_op(Opcode::Return);

        if free.is_empty() {
            // No captures: allocate the function at compile time.
            let function =
                self.heap.alloc(HeapData::Function(Function { code: code_id, cells: vec![] }));
            self.constant_objects.insert(function);
            self.co = prev_co;
            if let Some(class_id) = self.current_class {
                self.heap
                    .class_mut(class_id)
                    .expect("current class")
                    .properties
                    .insert(name.to_owned(), Value::Object(function));
            } else {
                let index = self.co_mut().add_const(Value::Object(function));
                let index = self.const_u8(index)?;
                self.emit_op(Opcode::Const);
                self.emit(index);
            }
        } else {
            if self.current_class.is_some() {
                return Err(CompErr::new(CompErrKind::MethodCaptures(name.to_owned())));
            }
            self.co = prev_co;
            // Load the cells to capture (from the enclosing unit), then
            // the code object, then build the closure.
            for free_name in &free {
                let index = self
                    .co()
                    .cell_index(free_name)
                    .ok_or_else(|| CompErr::reference(free_name.as_str()))?;
                let index = self.cell_u8(index)?;
                self.emit_op(Opcode::LoadCell);
                self.emit(index);
            }
            let index = self.const_u8(code_const)?;
            self.emit_op(Opcode::Const);
            self.emit(index);
            self.emit_op(Opcode::MakeFunction);
            self.emit(free.len() as u8);
        }

        self.scope_stack.pop();
        Ok(())
    }

    /// `(class <Name> <Super|null> <member>...)`. The class object is
    /// built at compile time, bound to a global slot, and populated by
    /// its member definitions; the expression evaluates to the class.
    fn gen_class(&mut self, children: &[Expr]) -> CompResult<()> {
        let name = form_symbol(children, 1, "class")?;
        let super_name = form_symbol(children, 2, "class")?;
        let super_class = if super_name == "null" {
            None
        } else {
            Some(*self.classes.get(super_name).ok_or_else(|| {
                CompErr::new(CompErrKind::UnknownClass(super_name.to_owned()))
            })?)
        };

        let class_id = self.heap.alloc(HeapData::Class(Class {
            name: name.to_owned(),
            super_class,
            properties: IndexMap::new(),
        }));
        self.constant_objects.insert(class_id);
        self.classes.insert(name.to_owned(), class_id);

        self.globals.define(name);
        let index = self.globals.get_index(name).expect("global just defined");
        self.globals.set(index, Value::Object(class_id)).expect("global just defined");

        let prev_class = self.current_class.replace(class_id);
        for member in &children[3..] {
            if !member.is_tagged("def") {
                return Err(CompErr::syntax(format!(
                    "class {name} members must be function definitions"
                )));
            }
            self.gen(member)?;
        }
        self.current_class = prev_class;

        let index = self.global_u8(index)?;
        self.emit_op(Opcode::GetGlobal);
        self.emit(index);
        Ok(())
    }

    /// `(new <Class> <args>...)`: NEW pushes the constructor and the
    /// fresh instance, which becomes the constructor's first argument.
    fn gen_new(&mut self, children: &[Expr]) -> CompResult<()> {
        self.gen(form_child(children, 1, "new")?)?;
        self.emit_op(Opcode::New);
        for arg in &children[2..] {
            self.gen(arg)?;
        }
        let argc = children.len() - 2 + 1;
        let argc = self.arg_u8(argc)?;
        self.emit_op(Opcode::Call);
        self.emit(argc);
        Ok(())
    }

    /// `(prop <obj> <name>)`: the name is a string constant.
    fn gen_prop(&mut self, children: &[Expr]) -> CompResult<()> {
        self.gen(form_child(children, 1, "prop")?)?;
        let index = self.string_const_idx(form_symbol(children, 2, "prop")?)?;
        self.emit_op(Opcode::GetProp);
        self.emit(index);
        Ok(())
    }

    /// `(super <Class>)` resolves at compile time to the named class's
    /// superclass, read from its global slot.
    fn gen_super(&mut self, children: &[Expr]) -> CompResult<()> {
        let name = form_symbol(children, 1, "super")?;
        let class_id = *self
            .classes
            .get(name)
            .ok_or_else(|| CompErr::new(CompErrKind::UnknownClass(name.to_owned())))?;
        let super_id = self
            .heap
            .class(class_id)
            .expect("registered class")
            .super_class
            .ok_or_else(|| CompErr::new(CompErrKind::NoSuperclass(name.to_owned())))?;
        let super_name = self.heap.class(super_id).expect("registered class").name.clone();
        let index = self
            .globals
            .get_index(&super_name)
            .ok_or_else(|| CompErr::reference(super_name.as_str()))?;
        let index = self.global_u8(index)?;
        self.emit_op(Opcode::GetGlobal);
        self.emit(index);
        Ok(())
    }

    /// Function call: callee, then arguments left to right.
    fn gen_call(&mut self, children: &[Expr]) -> CompResult<()> {
        self.gen(&children[0])?;
        for arg in &children[1..] {
            self.gen(arg)?;
        }
        let argc = self.arg_u8(children.len() - 1)?;
        self.emit_op(Opcode::Call);
        self.emit(argc);
        Ok(())
    }

    // Blocks ----------------------------------------------------------

    fn block_enter(&mut self) {
        self.co_mut().scope_level += 1;
    }

    /// Emit the SCOPE_EXIT that pops this block's locals (plus the
    /// callee and arguments when leaving a function body).
    fn block_exit(&mut self) -> CompResult<()> {
        let mut vars_count = 0;
        {
            let co = self.co_mut();
            while co.locals.last().map_or(false, |local| local.depth == co.scope_level) {
                co.locals.pop();
                vars_count += 1;
            }
        }
        // A function body always cleans up, if only its callee slot.
        if vars_count > 0 || self.co().arity > 0 || self.is_function_body() {
            if self.is_function_body() {
                vars_count += self.co().arity + 1;
            }
            if vars_count > u8::MAX as usize {
                return Err(CompErr::new(CompErrKind::TooManyLocals(self.co().name.clone())));
            }
            self.emit_op(Opcode::ScopeExit);
            self.emit(vars_count as u8);
        }
        self.co_mut().scope_level -= 1;
        Ok(())
    }

    fn is_global_scope(&self) -> bool {
        let co = self.co();
        co.name == "main" && co.scope_level == 1
    }

    fn is_function_body(&self) -> bool {
        let co = self.co();
        co.name != "main" && co.scope_level == 1
    }

    /// A `set` whose target is a global; its value is left for the next
    /// statement to ignore rather than popped.
    fn is_global_set(&self, expr: &Expr) -> bool {
        if !expr.is_tagged("set") {
            return false;
        }
        let children = expr.as_list().expect("set is a list");
        match children.get(1).and_then(|target| target.as_symbol()) {
            Some(name) => !matches!(
                self.allocation(name),
                Some(Allocation::Local) | Some(Allocation::Cell)
            ),
            None => false,
        }
    }

    // Constants -------------------------------------------------------

    /// Intern a numeric constant in the current pool.
    fn numeric_const_idx(&mut self, value: f64) -> CompResult<u8> {
        let found = self.co().constants.iter().position(|constant| match constant {
            Value::Number(number) => *number == value,
            _ => false,
        });
        let index = match found {
            Some(index) => index,
            None => self.co_mut().add_const(Value::Number(value)),
        };
        self.const_u8(index)
    }

    fn boolean_const_idx(&mut self, value: bool) -> CompResult<u8> {
        let found = self.co().constants.iter().position(|constant| match constant {
            Value::Boolean(boolean) => *boolean == value,
            _ => false,
        });
        let index = match found {
            Some(index) => index,
            None => self.co_mut().add_const(Value::Boolean(value)),
        };
        self.const_u8(index)
    }

    /// Intern a string constant, deduplicating by content.
    fn string_const_idx(&mut self, value: &str) -> CompResult<u8> {
        let found = self.co().constants.iter().position(|constant| match constant {
            Value::Object(id) => {
                self.heap.str_value(*id).map(|string| string == value).unwrap_or(false)
            }
            _ => false,
        });
        let index = match found {
            Some(index) => index,
            None => {
                let id = self.heap.alloc(HeapData::Str(value.to_owned()));
                self.constant_objects.insert(id);
                self.co_mut().add_const(Value::Object(id))
            }
        };
        self.const_u8(index)
    }

    // Emission --------------------------------------------------------

    fn create_code(&mut self, name: &str, arity: usize) -> ObjectId {
        let id = self.heap.alloc(HeapData::Code(Code::new(name, arity)));
        self.code_objects.push(id);
        self.constant_objects.insert(id);
        id
    }

    fn co(&self) -> &Code {
        self.heap.code(self.co).expect("current code object")
    }

    fn co_mut(&mut self) -> &mut Code {
        self.heap.code_mut(self.co).expect("current code object")
    }

    fn emit(&mut self, byte: u8) {
        self.co_mut().push_byte(byte);
    }

    fn emit_op(&mut self, op: Opcode) {
        self.emit(op.into());
    }

    fn emit_u16(&mut self, value: u16) {
        self.emit((value >> 8) as u8);
        self.emit((value & 0xFF) as u8);
    }

    fn offset(&self) -> usize {
        self.co().offset()
    }

    /// Backpatch a jump operand. Targets are absolute and must fit in
    /// two bytes.
    fn patch_jump(&mut self, offset: usize, target: usize) -> CompResult<()> {
        if target > u16::MAX as usize {
            return Err(CompErr::new(CompErrKind::CodeTooLarge(self.co().name.clone())));
        }
        self.co_mut().patch_jump(offset, target as u16);
        Ok(())
    }

    fn emit_jump_back(&mut self, target: usize) -> CompResult<()> {
        if target > u16::MAX as usize {
            return Err(CompErr::new(CompErrKind::CodeTooLarge(self.co().name.clone())));
        }
        self.emit_op(Opcode::Jmp);
        self.emit_u16(target as u16);
        Ok(())
    }

    // Operand width checks --------------------------------------------

    fn const_u8(&self, index: usize) -> CompResult<u8> {
        if index > u8::MAX as usize {
            Err(CompErr::new(CompErrKind::TooManyConstants(self.co().name.clone())))
        } else {
            Ok(index as u8)
        }
    }

    fn local_u8(&self, index: usize) -> CompResult<u8> {
        if index > u8::MAX as usize {
            Err(CompErr::new(CompErrKind::TooManyLocals(self.co().name.clone())))
        } else {
            Ok(index as u8)
        }
    }

    fn cell_u8(&self, index: usize) -> CompResult<u8> {
        if index > u8::MAX as usize {
            Err(CompErr::new(CompErrKind::TooManyCells(self.co().name.clone())))
        } else {
            Ok(index as u8)
        }
    }

    fn global_u8(&self, index: usize) -> CompResult<u8> {
        if index > u8::MAX as usize {
            Err(CompErr::new(CompErrKind::TooManyGlobals))
        } else {
            Ok(index as u8)
        }
    }

    fn arg_u8(&self, count: usize) -> CompResult<u8> {
        if count > u8::MAX as usize {
            Err(CompErr::new(CompErrKind::TooManyArgs(count)))
        } else {
            Ok(count as u8)
        }
    }

    // -----------------------------------------------------------------

    fn scope(&self) -> ScopeId {
        *self.scope_stack.last().expect("scope stack is empty")
    }

    fn allocation(&self, name: &str) -> Option<Allocation> {
        self.scopes.allocation(self.scope(), name)
    }
}

// Form shape helpers shared with the analyzer ------------------------

pub(crate) fn form_child<'a>(children: &'a [Expr], index: usize, form: &str) -> CompResult<&'a Expr> {
    children.get(index).ok_or_else(|| CompErr::syntax(format!("malformed {form} form")))
}

pub(crate) fn form_symbol<'a>(
    children: &'a [Expr],
    index: usize,
    form: &str,
) -> CompResult<&'a str> {
    form_child(children, index, form)?
        .as_symbol()
        .ok_or_else(|| CompErr::syntax(format!("{form} expects a name")))
}

pub(crate) fn form_list<'a>(expr: &'a Expr, what: &str) -> CompResult<&'a [Expr]> {
    expr.as_list().ok_or_else(|| CompErr::syntax(format!("expected a {what}")))
}
