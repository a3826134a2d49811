use crate::op;
use wisp_runtime::{
    ArithOp, CallKind, Execute, HookMask, Instruction, Prototype, Ptr, Result, ResultCount, Value,
    Vm, arith, runtime_error, to_number, type_error,
};

/// A minimal bytecode loop for exercising the runtime in tests
///
/// Only the instructions in [op](crate::op) are supported.
#[derive(Clone, Copy, Debug, Default)]
pub struct TestInterpreter;

impl Execute for TestInterpreter {
    fn execute(&self, vm: &mut Vm) -> Result<()> {
        loop {
            let (instruction, base, prototype) = fetch(vm)?;
            if vm
                .hook_mask()
                .intersects(HookMask::LINE | HookMask::COUNT)
            {
                vm.trace_execution()?;
            }

            let a = instruction.a();
            let ra = base + a;

            match instruction.op_code() {
                op::MOVE => vm.set(ra, vm.get(base + instruction.b())),
                op::LOADK => vm.set(ra, constant(&prototype, instruction.bx())?),
                op::LOADNIL => {
                    for register in ra..=ra + instruction.b() {
                        vm.set(register, Value::Nil);
                    }
                }
                op::GETUPVAL => {
                    let value = vm.upvalue(instruction.b()).unwrap_or_default();
                    vm.set(ra, value);
                }
                op::SETUPVAL => {
                    vm.set_upvalue(instruction.b(), vm.get(ra));
                }
                op::ADD | op::SUB => {
                    let lhs = rk(vm, &prototype, base, instruction.b())?;
                    let rhs = rk(vm, &prototype, base, instruction.c())?;
                    let arith_op = if instruction.op_code() == op::ADD {
                        ArithOp::Add
                    } else {
                        ArithOp::Subtract
                    };
                    vm.set(ra, arith_values(arith_op, &lhs, &rhs)?);
                }
                op::JMP => {
                    if a > 0 {
                        vm.close_upvalues(base + a - 1);
                    }
                    jump(vm, instruction.sbx());
                }
                op::EQ => {
                    let lhs = rk(vm, &prototype, base, instruction.b())?;
                    let rhs = rk(vm, &prototype, base, instruction.c())?;
                    if lhs.raw_equals(&rhs) != (a != 0) {
                        jump(vm, 1);
                    }
                }
                op::CALL => {
                    let b = instruction.b();
                    if b != 0 {
                        vm.set_top(ra + b);
                    }
                    let results = match instruction.c() {
                        0 => ResultCount::All,
                        c => ResultCount::Exact(c - 1),
                    };
                    if vm.pre_call(ra, results)? == CallKind::Native && results.is_exact() {
                        vm.restore_frame_top();
                    }
                }
                op::TAILCALL => {
                    let b = instruction.b();
                    if b != 0 {
                        vm.set_top(ra + b);
                    }
                    vm.tail_call(ra)?;
                }
                op::RETURN => {
                    let b = instruction.b();
                    if b != 0 {
                        vm.set_top(ra + b - 1);
                    }
                    let fresh = vm.current_frame().status().is_fresh();
                    let exact = vm.post_call(ra)?;
                    if fresh {
                        return Ok(());
                    }
                    if exact {
                        vm.restore_frame_top();
                    }
                }
                op::CLOSURE => {
                    let Some(nested) = prototype.prototypes.get(instruction.bx()).cloned() else {
                        return runtime_error!("missing prototype {}", instruction.bx());
                    };
                    let enclosing = vm
                        .current_closure()
                        .map(|closure| closure.upvalues().to_vec())
                        .unwrap_or_default();
                    let closure = vm.instantiate(&nested, &enclosing, base)?;
                    vm.set(ra, closure);
                }
                op::VARARG => {
                    let function = vm.current_frame().function();
                    let available = base - function - 1 - prototype.parameter_count;
                    let wanted = match instruction.b() {
                        0 => {
                            vm.check_stack(available)?;
                            vm.set_top(ra + available);
                            available
                        }
                        b => b - 1,
                    };
                    for i in 0..wanted {
                        let value = if i < available {
                            vm.get(base - available + i)
                        } else {
                            Value::Nil
                        };
                        vm.set(ra + i, value);
                    }
                }
                unsupported => return runtime_error!("unsupported op code {unsupported}"),
            }
        }
    }
}

fn fetch(vm: &mut Vm) -> Result<(Instruction, usize, Ptr<Prototype>)> {
    let Some(frame) = vm.current_frame_mut().as_script_mut() else {
        return runtime_error!("expected a script frame");
    };
    let Some(instruction) = frame.step() else {
        return runtime_error!("missing return instruction");
    };
    Ok((instruction, frame.base(), frame.prototype().clone()))
}

fn jump(vm: &mut Vm, offset: isize) {
    if let Some(frame) = vm.current_frame_mut().as_script_mut() {
        frame.jump(offset);
    }
}

fn constant(prototype: &Prototype, index: usize) -> Result<Value> {
    match prototype.constants.get(index) {
        Some(value) => Ok(value.clone()),
        None => runtime_error!("missing constant {index}"),
    }
}

fn rk(vm: &Vm, prototype: &Prototype, base: usize, operand: usize) -> Result<Value> {
    let flag = op::CONSTANT as usize;
    if operand & flag != 0 {
        constant(prototype, operand & !flag)
    } else {
        Ok(vm.get(base + operand))
    }
}

fn arith_values(arith_op: ArithOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    match (to_number(lhs), to_number(rhs)) {
        (Some(a), Some(b)) => Ok(arith(arith_op, a, b).into()),
        (None, _) => type_error("perform arithmetic on", lhs),
        (_, None) => type_error("perform arithmetic on", rhs),
    }
}
