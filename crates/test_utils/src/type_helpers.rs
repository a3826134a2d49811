use crate::TestInterpreter;
use wisp_runtime::{
    Closure, Instruction, NativeFn, Prototype, Ptr, Result, ResultCount, Value, Vm, VmSettings,
};

/// Returns the settings used by [test_vm]
pub fn test_settings() -> VmSettings {
    VmSettings::default().with_executor(TestInterpreter)
}

/// Returns a [Vm] that runs script functions with a [TestInterpreter]
pub fn test_vm() -> Vm {
    Vm::with_settings(test_settings())
}

/// Returns a Value::Function wrapping a native function
pub fn native(function: impl NativeFn) -> Value {
    Closure::native(function).into()
}

/// Returns a prototype with the given code, constants, and number of registers
pub fn prototype(code: Vec<Instruction>, constants: Vec<Value>, max_stack_size: usize) -> Prototype {
    Prototype {
        code,
        constants,
        max_stack_size,
        source: "test".into(),
        ..Default::default()
    }
}

/// Returns a Value::Function for a script closure without upvalues
pub fn script(prototype: Prototype) -> Value {
    Closure::script(Ptr::from(prototype), Vec::new()).into()
}

/// Pushes a function and its arguments to the stack, calls it, and then pops the results
pub fn call_function(
    vm: &mut Vm,
    function: impl Into<Value>,
    args: &[Value],
    results: ResultCount,
) -> Result<Vec<Value>> {
    vm.check_stack(args.len() + 1)?;
    let position = vm.top();
    vm.push(function);
    for arg in args {
        vm.push(arg.clone());
    }

    vm.call(position, results, false)?;

    let values = vm.values_from(position);
    vm.set_top(position);
    Ok(values)
}

/// Returns the values rendered as strings, for comparing results
pub fn value_strings(values: &[Value]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}
