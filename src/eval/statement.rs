use async_recursion::async_recursion;
use bigdecimal::{BigDecimal, Zero};
use tracing::{debug, warn};

use super::context::{ExecutionContext, Trap};
use super::evaluator::{ControlFlow, Evaluator, Flow, Interrupt};
use super::{numeric, EvalError, Value};
use crate::address::AddressCall;
use crate::ast::{
    AddressClause, DoKind, DoLoop, Expression, SignalClause, Statement, StatementKind,
};
use crate::checkpoint::CheckpointRecord;
use crate::library::LoadRequest;

/// What a loop does after one pass of its body.
enum Step {
    Next,
    Break,
    Propagate(ControlFlow),
}

fn loop_step(flow: ControlFlow, variable: Option<&str>) -> Step {
    let mine = |name: &Option<String>| match name {
        None => true,
        Some(name) => variable.map_or(false, |v| v.eq_ignore_ascii_case(name)),
    };
    match flow {
        ControlFlow::Normal => Step::Next,
        ControlFlow::Leave(ref name) if mine(name) => Step::Break,
        ControlFlow::Iterate(ref name) if mine(name) => Step::Next,
        other => Step::Propagate(other),
    }
}

macro_rules! run_body {
    ($self:ident, $do_loop:ident, $ctx:ident) => {
        match loop_step(
            $self.exec_block(&$do_loop.body, $ctx).await?,
            $do_loop.control_variable(),
        ) {
            Step::Next => {}
            Step::Break => break,
            Step::Propagate(flow) => return Ok(flow),
        }
    };
}

impl Evaluator {
    #[async_recursion]
    pub(crate) async fn exec_statement(
        &self,
        statement: &Statement,
        ctx: &mut ExecutionContext,
    ) -> Flow<ControlFlow> {
        match &statement.kind {
            StatementKind::Assignment { target, value } => {
                let value = self.eval(value, ctx).await?;
                ctx.assign(target, value);
            }
            StatementKind::Say(expression) => {
                let value = self.eval(expression, ctx).await?;
                self.session.output().write(&value.to_string());
            }
            StatementKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval_condition(condition, ctx).await? {
                    return self.exec_block(then_branch, ctx).await;
                }
                if let Some(else_branch) = else_branch {
                    return self.exec_block(else_branch, ctx).await;
                }
            }
            StatementKind::Do(do_loop) => return self.exec_do(do_loop, ctx).await,
            StatementKind::Select { whens, otherwise } => {
                for when in whens {
                    if self.eval_condition(&when.condition, ctx).await? {
                        return self.exec_block(&when.body, ctx).await;
                    }
                }
                return match otherwise {
                    Some(body) => self.exec_block(body, ctx).await,
                    None => Err(EvalError::NoBranchSelected.into()),
                };
            }
            StatementKind::Address(clause) => match clause {
                AddressClause::Switch(name) => ctx.set_address(name),
                AddressClause::Swap => ctx.swap_address(),
                AddressClause::Once { target, command } => {
                    self.exec_command(Some(target.as_str()), command, ctx).await?;
                }
            },
            StatementKind::Command(command) => {
                self.exec_command(None, command, ctx).await?;
            }
            StatementKind::Require { identifier, alias } => {
                self.exec_require(identifier, alias.as_deref(), ctx).await?;
            }
            StatementKind::Checkpoint {
                key,
                value,
                progress,
            } => {
                self.exec_checkpoint(key, value, progress.as_ref(), ctx)
                    .await?;
            }
            StatementKind::Exit(expression) => {
                let value = self.eval_optional(expression.as_ref(), ctx).await?;
                return Err(Interrupt::Exit(value));
            }
            StatementKind::Return(expression) => {
                let value = self.eval_optional(expression.as_ref(), ctx).await?;
                return Ok(ControlFlow::Return(value));
            }
            StatementKind::Call { name, arguments } => {
                match self.call_named(name, arguments, false, ctx).await? {
                    Some(value) => ctx.set_var("RESULT", value),
                    None => ctx.remove_var("RESULT"),
                }
            }
            StatementKind::Label(_) | StatementKind::Nop => {}
            StatementKind::Procedure { expose } => ctx.expose(expose),
            StatementKind::ParseArg { names, upper } => {
                let arguments = ctx.arguments().to_vec();
                for (index, name) in names.iter().enumerate() {
                    let value = match arguments.get(index) {
                        Some(value) if *upper => Value::from(value.to_string().to_uppercase()),
                        Some(value) => value.clone(),
                        None => Value::from(""),
                    };
                    ctx.assign(name, value);
                }
            }
            StatementKind::Leave(name) => return Ok(ControlFlow::Leave(name.clone())),
            StatementKind::Iterate(name) => return Ok(ControlFlow::Iterate(name.clone())),
            StatementKind::Signal(clause) => match clause {
                SignalClause::Goto(label) => return Ok(ControlFlow::Goto(label.to_uppercase())),
                SignalClause::On { mode, label } => {
                    ctx.trap = Some(Trap {
                        mode: *mode,
                        label: label.as_deref().unwrap_or("ERROR").to_uppercase(),
                    });
                }
                SignalClause::Off => ctx.trap = None,
            },
            StatementKind::NumericDigits(expression) => {
                let value = self.eval(expression, ctx).await?;
                let digits = value
                    .to_number()
                    .as_ref()
                    .and_then(numeric::to_whole_i64)
                    .filter(|n| *n > 0)
                    .map(|n| n as u64)
                    .ok_or_else(|| EvalError::InvalidOperand {
                        operator: "NUMERIC DIGITS".to_string(),
                        message: format!("'{}' is not a positive whole number", value),
                    })?;
                ctx.set_digits(digits);
            }
            StatementKind::Drop(names) => {
                for name in names {
                    ctx.drop_var(name);
                }
            }
        }
        Ok(ControlFlow::Normal)
    }

    async fn eval_optional(
        &self,
        expression: Option<&Expression>,
        ctx: &mut ExecutionContext,
    ) -> Flow<Option<Value>> {
        match expression {
            Some(expression) => Ok(Some(self.eval(expression, ctx).await?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn eval_condition(
        &self,
        expression: &Expression,
        ctx: &mut ExecutionContext,
    ) -> Flow<bool> {
        let value = self.eval(expression, ctx).await?;
        value.to_logical().ok_or_else(|| {
            EvalError::NotLogical {
                value: value.to_string(),
            }
            .into()
        })
    }

    async fn eval_number(
        &self,
        expression: &Expression,
        ctx: &mut ExecutionContext,
    ) -> Flow<BigDecimal> {
        let value = self.eval(expression, ctx).await?;
        value.to_number().ok_or_else(|| {
            EvalError::NotNumeric {
                value: value.to_string(),
            }
            .into()
        })
    }

    async fn exec_do(&self, do_loop: &DoLoop, ctx: &mut ExecutionContext) -> Flow<ControlFlow> {
        match &do_loop.kind {
            DoKind::Block => return self.exec_block(&do_loop.body, ctx).await,
            DoKind::Forever => loop {
                run_body!(self, do_loop, ctx);
            },
            DoKind::Repeat(count) => {
                let count = self.eval_number(count, ctx).await?;
                let count = numeric::to_whole_i64(&count)
                    .filter(|n| *n >= 0)
                    .ok_or_else(|| {
                        EvalError::InvalidLoop(format!(
                            "repeat count {} is not a non-negative whole number",
                            numeric::format(&count)
                        ))
                    })?;
                for _ in 0..count {
                    run_body!(self, do_loop, ctx);
                }
            }
            DoKind::Range {
                variable,
                start,
                end,
                step: by,
            } => {
                let mut current = self.eval_number(start, ctx).await?;
                let end = match end {
                    Some(end) => Some(self.eval_number(end, ctx).await?),
                    None => None,
                };
                let increment = match by {
                    Some(by) => self.eval_number(by, ctx).await?,
                    None => BigDecimal::from(1),
                };
                if increment.is_zero() {
                    return Err(EvalError::InvalidLoop("BY must not be zero".to_string()).into());
                }
                let ascending = increment > BigDecimal::zero();
                loop {
                    if let Some(end) = &end {
                        if (ascending && current > *end) || (!ascending && current < *end) {
                            break;
                        }
                    }
                    ctx.assign(variable, Value::from(current.clone()));
                    run_body!(self, do_loop, ctx);
                    // the body may have reassigned the control variable
                    let value = ctx.value_of(variable)?;
                    let value = value.to_number().ok_or_else(|| EvalError::NotNumeric {
                        value: value.to_string(),
                    })?;
                    current = numeric::add(&value, &increment, ctx.digits)?;
                }
            }
            DoKind::Over {
                variable,
                collection,
            } => {
                let items = match collection {
                    Expression::Symbol(stem) if stem.ends_with('.') => ctx.stem_elements(stem),
                    other => match self.eval(other, ctx).await? {
                        Value::Array(items) => items,
                        Value::Map(map) => map.keys().map(|k| Value::from(k.as_str())).collect(),
                        other => {
                            return Err(EvalError::InvalidLoop(format!(
                                "cannot iterate over a {}",
                                other.type_name()
                            ))
                            .into())
                        }
                    },
                };
                for item in items {
                    ctx.assign(variable, item);
                    run_body!(self, do_loop, ctx);
                }
            }
            DoKind::While(condition) => {
                while self.eval_condition(condition, ctx).await? {
                    run_body!(self, do_loop, ctx);
                }
            }
            DoKind::Until(condition) => loop {
                run_body!(self, do_loop, ctx);
                if self.eval_condition(condition, ctx).await? {
                    break;
                }
            },
        }
        Ok(ControlFlow::Normal)
    }

    /// A bare clause (or `ADDRESS name expr`) sent as a command string. A HEREDOC goes out as
    /// its raw text.
    async fn exec_command(
        &self,
        target: Option<&str>,
        command: &Expression,
        ctx: &mut ExecutionContext,
    ) -> Flow<()> {
        let text = match command {
            Expression::Heredoc { raw, .. } => raw.clone(),
            other => self.eval(other, ctx).await?.to_string(),
        };
        let target = match target {
            Some(name) => Some(name.to_uppercase()),
            None => ctx.address().map(str::to_string),
        };
        self.dispatch_to(target.as_deref(), AddressCall::Command(text), ctx)
            .await?;
        Ok(())
    }

    async fn exec_require(
        &self,
        identifier: &Expression,
        alias: Option<&str>,
        ctx: &mut ExecutionContext,
    ) -> Flow<()> {
        let identifier = self.eval(identifier, ctx).await?.to_string();
        let request = LoadRequest::new(identifier)
            .with_alias(alias.map(str::to_string))
            .with_base_dir(ctx.script_dir.clone());
        let loading = self.session.loader().require(&request, &self.session);
        let registration = match self.session.config().require_timeout {
            Some(limit) => tokio::time::timeout(limit, loading).await.map_err(|_| {
                EvalError::Timeout {
                    operation: format!("REQUIRE {}", request.identifier),
                    millis: limit.as_millis() as u64,
                }
            })?,
            None => loading.await,
        }
        .map_err(EvalError::from)?;
        debug!(
            identifier = %registration.identifier,
            target = ?registration.address_target,
            "required"
        );
        Ok(())
    }

    async fn exec_checkpoint(
        &self,
        key: &Expression,
        value: &Expression,
        progress: Option<&Expression>,
        ctx: &mut ExecutionContext,
    ) -> Flow<()> {
        let key = self.eval(key, ctx).await?.to_string();
        let value = self.eval(value, ctx).await?;
        let progress = match progress {
            Some(expression) => Some(
                numeric::to_f64(&self.eval_number(expression, ctx).await?)
                    .ok_or_else(|| EvalError::Checkpoint("progress out of range".to_string()))?,
            ),
            None => None,
        };
        let mut record =
            CheckpointRecord::new(ctx.execution_id.to_string(), 0, key, value.to_json(), progress)
                .map_err(|e| EvalError::Checkpoint(e.to_string()))?;
        record.sequence = ctx.next_checkpoint_sequence();
        let sequence = record.sequence;
        if let Err(e) = self.session.checkpoints().publish(record) {
            warn!(sequence, "checkpoint not delivered: {}", e);
        }
        Ok(())
    }
}
