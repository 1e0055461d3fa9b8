use std::sync::Arc;

use async_recursion::async_recursion;
use tracing::debug;

use super::context::{ExecutionContext, Frame, Trap};
use super::{numeric, EvalError, RuntimeError, Value, ValueMap};
use crate::address::{dispatch, AddressCall, DispatchError, DispatchOutcome, SourceContext};
use crate::ast::{Arguments, Program, Statement, TrapMode};
use crate::functions::{CallArgs, FunctionEntry};
use crate::session::InterpreterSession;

/// How a clause finished, as seen by the block that ran it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ControlFlow {
    Normal,
    Leave(Option<String>),
    Iterate(Option<String>),
    Return(Option<Value>),
    /// `SIGNAL label`, or a fired SIGNAL ON ERROR trap
    Goto(String),
}

/// Unwinds past every block and routine. EXIT is not an error; it only travels the same way.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Interrupt {
    Exit(Option<Value>),
    Fault(EvalError),
}

impl From<EvalError> for Interrupt {
    fn from(error: EvalError) -> Self {
        Interrupt::Fault(error)
    }
}

pub(crate) type Flow<T> = Result<T, Interrupt>;

/// Runs one program. Library routines run under an evaluator of their own program, on the
/// caller's [`ExecutionContext`].
#[derive(Clone)]
pub struct Evaluator {
    pub(crate) session: InterpreterSession,
    pub(crate) program: Arc<Program>,
}

impl Evaluator {
    pub fn new(session: InterpreterSession, program: Arc<Program>) -> Self {
        Self { session, program }
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// Top level entry point. Returns the EXIT value, if any.
    pub async fn run(&self, ctx: &mut ExecutionContext) -> Result<Option<Value>, RuntimeError> {
        let result = self.run_from(0, None, ctx).await;
        finish(result, ctx)
    }

    /// Runs the top-level clauses that precede the first label.
    pub async fn run_prologue(&self, ctx: &mut ExecutionContext) -> Result<(), RuntimeError> {
        let stop = self
            .program
            .statements
            .iter()
            .position(|s| matches!(s.kind, crate::ast::StatementKind::Label(_)));
        let result = self.run_from(0, stop, ctx).await;
        finish(result, ctx).map(|_| ())
    }

    /// Calls `label` as a routine in a fresh frame on `ctx`.
    pub async fn call_routine(
        &self,
        label: &str,
        args: CallArgs,
        ctx: &mut ExecutionContext,
    ) -> Result<Option<Value>, RuntimeError> {
        let result = self.invoke_label(label, args, Vec::new(), ctx).await;
        finish(result, ctx)
    }

    /// Executes clauses from `start` until the end (or `stop`), following SIGNAL jumps.
    #[async_recursion]
    pub(crate) async fn run_from(
        &self,
        start: usize,
        stop: Option<usize>,
        ctx: &mut ExecutionContext,
    ) -> Flow<Option<Value>> {
        let statements = &self.program.statements;
        let end = stop.unwrap_or(statements.len()).min(statements.len());
        let mut pc = start;
        while pc < end {
            let statement = &statements[pc];
            match self.exec_clause(statement, ctx).await? {
                ControlFlow::Normal => pc += 1,
                ControlFlow::Return(value) => return Ok(value),
                ControlFlow::Goto(label) => {
                    pc = self.program.label(&label).ok_or_else(|| {
                        fault_at(EvalError::UnknownLabel { name: label.clone() }, statement, ctx)
                    })?;
                }
                ControlFlow::Leave(_) => {
                    return Err(fault_at(not_in_loop("LEAVE"), statement, ctx).into())
                }
                ControlFlow::Iterate(_) => {
                    return Err(fault_at(not_in_loop("ITERATE"), statement, ctx).into())
                }
            }
        }
        Ok(None)
    }

    /// Runs a clause and applies the armed error trap to whatever failure it raises. The
    /// innermost clause that lets a failure through records its location.
    #[async_recursion]
    pub(crate) async fn exec_clause(
        &self,
        statement: &Statement,
        ctx: &mut ExecutionContext,
    ) -> Flow<ControlFlow> {
        let mut result = self.exec_statement(statement, ctx).await;
        if let Err(Interrupt::Fault(error)) = &result {
            // a located fault already passed through an inner clause
            let fresh = ctx.error_location.is_none();
            if let (true, true, Some(trap)) = (fresh, error.is_trappable(), ctx.trap.clone()) {
                let error = error.clone();
                ctx.error_location = None;
                result = self.fire_trap(trap, error, statement, ctx).await;
            }
        }
        if matches!(result, Err(Interrupt::Fault(_))) && ctx.error_location.is_none() {
            ctx.error_location = Some(statement.span);
        }
        result
    }

    pub(crate) async fn exec_block(
        &self,
        statements: &[Statement],
        ctx: &mut ExecutionContext,
    ) -> Flow<ControlFlow> {
        for statement in statements {
            match self.exec_clause(statement, ctx).await? {
                ControlFlow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(ControlFlow::Normal)
    }

    async fn fire_trap(
        &self,
        trap: Trap,
        error: EvalError,
        statement: &Statement,
        ctx: &mut ExecutionContext,
    ) -> Flow<ControlFlow> {
        debug!(label = %trap.label, mode = %trap.mode, "error trapped: {}", error);
        let condition = vec![
            ("RC", Value::from(error.return_code())),
            ("ERRORTEXT", Value::from(error.error_text())),
            ("SIGL", Value::from(statement.span.line)),
        ];
        for (name, value) in &condition {
            ctx.set_var(name, value.clone());
        }
        match trap.mode {
            TrapMode::Signal => {
                ctx.trap = None;
                Ok(ControlFlow::Goto(trap.label))
            }
            TrapMode::Call => {
                // the handler runs with the trap disarmed
                let armed = ctx.trap.take();
                let result = self
                    .invoke_label(&trap.label, CallArgs::Positional(Vec::new()), condition, ctx)
                    .await;
                ctx.trap = armed;
                result.map(|_| ControlFlow::Normal)
            }
        }
    }

    /// Runs an internal routine: new frame, arguments bound, settings saved and restored.
    #[async_recursion]
    pub(crate) async fn invoke_label(
        &self,
        label: &str,
        args: CallArgs,
        seed: Vec<(&'static str, Value)>,
        ctx: &mut ExecutionContext,
    ) -> Flow<Option<Value>> {
        let index = self
            .program
            .label(label)
            .ok_or_else(|| EvalError::UnknownLabel {
                name: label.to_uppercase(),
            })?;
        let (arguments, named) = match args {
            CallArgs::Positional(values) => (values, ValueMap::new()),
            CallArgs::Named(map) => (map.iter().map(|(_, v)| v.clone()).collect(), map),
        };
        ctx.push_frame(Frame::new(Some(label.to_uppercase()), arguments))?;
        for (name, value) in named {
            ctx.set_var(&name, value);
        }
        for (name, value) in seed {
            ctx.set_var(name, value);
        }
        let saved = ctx.save_settings();
        let result = self.run_from(index + 1, None, ctx).await;
        ctx.restore_settings(saved);
        ctx.pop_frame();
        result
    }

    /// Resolves and calls `name`: program labels, then the ARG and ADDRESS intrinsics, then
    /// the function table, then (for `f(k=v)` assignments) a method on the current ADDRESS
    /// environment.
    pub(crate) async fn call_named(
        &self,
        name: &str,
        arguments: &Arguments,
        method_fallback: bool,
        ctx: &mut ExecutionContext,
    ) -> Flow<Option<Value>> {
        let args = self.eval_arguments(arguments, ctx).await?;
        if self.program.label(name).is_some() {
            return self.invoke_label(name, args, Vec::new(), ctx).await;
        }
        let upper = name.to_uppercase();
        match upper.as_str() {
            "ARG" => return Ok(Some(intrinsic_arg(&args, ctx)?)),
            "ADDRESS" => return Ok(Some(Value::from(ctx.address().unwrap_or_default()))),
            _ => {}
        }
        if let Some(entry) = self.session.functions().get(&upper) {
            return self.call_entry(&upper, entry, args, ctx).await;
        }
        if let (true, Some(target), CallArgs::Named(params)) =
            (method_fallback, ctx.address().map(str::to_string), &args)
        {
            let call = AddressCall::Method {
                name: name.to_string(),
                params: params.clone(),
            };
            let outcome = self.dispatch_to(Some(&target), call, ctx).await?;
            return Ok(Some(outcome.result));
        }
        Err(EvalError::UnknownFunction { name: upper }.into())
    }

    async fn call_entry(
        &self,
        name: &str,
        entry: FunctionEntry,
        args: CallArgs,
        ctx: &mut ExecutionContext,
    ) -> Flow<Option<Value>> {
        match entry {
            FunctionEntry::Native(function) => {
                debug!(function = name, "native call");
                Ok(Some(function.call(args).await?))
            }
            FunctionEntry::Script { program, label } => {
                let library = Evaluator::new(self.session.clone(), program);
                match library.invoke_label(&label, args, Vec::new(), ctx).await {
                    // EXIT in a library routine ends that routine, not the caller
                    Err(Interrupt::Exit(value)) => Ok(value),
                    other => other,
                }
            }
        }
    }

    pub(crate) async fn eval_arguments(
        &self,
        arguments: &Arguments,
        ctx: &mut ExecutionContext,
    ) -> Flow<CallArgs> {
        match arguments {
            Arguments::Positional(expressions) => {
                let mut values = Vec::with_capacity(expressions.len());
                for expression in expressions {
                    values.push(self.eval(expression, ctx).await?);
                }
                Ok(CallArgs::Positional(values))
            }
            Arguments::Named(pairs) => {
                let mut map = ValueMap::new();
                for (key, expression) in pairs {
                    let value = self.eval(expression, ctx).await?;
                    map.insert(key.clone(), value);
                }
                Ok(CallArgs::Named(map))
            }
        }
    }

    /// Sends `call` to `target` and sets RC, RESULT and ERRORTEXT from the outcome. With
    /// `halt_on_dispatch_failure` a failed outcome is raised as a dispatch error.
    pub(crate) async fn dispatch_to(
        &self,
        target: Option<&str>,
        call: AddressCall,
        ctx: &mut ExecutionContext,
    ) -> Flow<DispatchOutcome> {
        let name = target.map(str::to_uppercase).unwrap_or_default();
        let outcome = match self.session.addresses().get(&name) {
            None if name.is_empty() => DispatchOutcome::failure("no ADDRESS environment is active"),
            None => DispatchOutcome::failure(DispatchError::UnknownTarget(name.clone()).to_string()),
            Some(target) => {
                let interpolated = target.metadata.interpreter_handles_interpolation;
                let call = if interpolated {
                    self.interpolate_call(call, ctx)
                } else {
                    call
                };
                let context = SourceContext {
                    execution_id: ctx.execution_id,
                    address: target.name.clone(),
                    interpolated,
                    variables: ctx.variables(),
                };
                let timeout = self.session.config().dispatch_timeout;
                match dispatch(&target, &call, &context, timeout).await {
                    Ok(outcome) => outcome,
                    Err(DispatchError::Timeout { target, millis }) => {
                        let message = format!("ADDRESS {} timed out after {}ms", target, millis);
                        ctx.set_var("RC", Value::from(1));
                        ctx.set_var("ERRORTEXT", Value::from(message));
                        return Err(EvalError::Timeout {
                            operation: format!("ADDRESS {}", target),
                            millis,
                        }
                        .into());
                    }
                    Err(other) => DispatchOutcome::failure(other.to_string()),
                }
            }
        };
        ctx.set_var("RC", Value::from(outcome.rc));
        ctx.set_var("RESULT", outcome.result.clone());
        match &outcome.error_text {
            Some(text) => ctx.set_var("ERRORTEXT", Value::from(text.as_str())),
            None => ctx.remove_var("ERRORTEXT"),
        }
        if !outcome.success && self.session.config().halt_on_dispatch_failure {
            return Err(EvalError::Dispatch {
                target: if name.is_empty() { "ADDRESS".to_string() } else { name },
                rc: outcome.rc,
                message: outcome.error_text.clone().unwrap_or_default(),
            }
            .into());
        }
        Ok(outcome)
    }

    fn interpolate_call(&self, call: AddressCall, ctx: &ExecutionContext) -> AddressCall {
        let interpolator = self.session.interpolator();
        let lookup = |name: &str| ctx.lookup(name);
        match call {
            AddressCall::Command(text) => AddressCall::Command(interpolator.interpolate(&text, lookup)),
            AddressCall::Method { name, params } => AddressCall::Method {
                name,
                params: params
                    .into_iter()
                    .map(|(key, value)| match value {
                        Value::String(text) => (key, Value::String(interpolator.interpolate(&text, lookup))),
                        other => (key, other),
                    })
                    .collect(),
            },
        }
    }
}

/// EXIT ends a run (or a library routine) normally, carrying its value.
fn finish(
    result: Flow<Option<Value>>,
    ctx: &mut ExecutionContext,
) -> Result<Option<Value>, RuntimeError> {
    match result {
        Ok(value) | Err(Interrupt::Exit(value)) => Ok(value),
        Err(Interrupt::Fault(error)) => Err(RuntimeError {
            error,
            location: ctx.error_location.take(),
        }),
    }
}

fn fault_at(error: EvalError, statement: &Statement, ctx: &mut ExecutionContext) -> EvalError {
    if ctx.error_location.is_none() {
        ctx.error_location = Some(statement.span);
    }
    error
}

fn not_in_loop(clause: &str) -> EvalError {
    EvalError::NotInLoop {
        clause: clause.to_string(),
    }
}

/// `ARG()` is the argument count, `ARG(n)` the nth argument or "", and `ARG(n, 'E')` /
/// `ARG(n, 'O')` test whether it exists or is omitted.
fn intrinsic_arg(args: &CallArgs, ctx: &ExecutionContext) -> Result<Value, EvalError> {
    let arguments = ctx.arguments();
    let Some(index) = args.get(0) else {
        return Ok(Value::from(arguments.len()));
    };
    let n = index
        .to_number()
        .as_ref()
        .and_then(numeric::to_whole_i64)
        .filter(|n| *n >= 1)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| EvalError::Function {
            function: "ARG".to_string(),
            message: format!("argument number must be a positive whole number, got '{}'", index),
        })?;
    let present = arguments.get(n - 1).filter(|v| !v.is_null());
    match args.get(1).map(|v| v.to_string().to_uppercase()) {
        None => Ok(present.cloned().unwrap_or_else(|| Value::from(""))),
        Some(option) if option.starts_with('E') => Ok(Value::from(present.is_some())),
        Some(option) if option.starts_with('O') => Ok(Value::from(present.is_none())),
        Some(option) => Err(EvalError::Function {
            function: "ARG".to_string(),
            message: format!("invalid option '{}'", option),
        }),
    }
}
