mod coroutines {
    use wisp_runtime::{prelude::*, DebugInfo, HookMask, Resumed, ThreadStatus};
    use wisp_test_utils::{op::*, *};

    fn suspend_with_args(vm: &mut Vm) -> Result<usize> {
        vm.suspend(vm.arg_count())
    }

    fn continuation(vm: &mut Vm) -> Result<usize> {
        let context = vm.continuation_context().unwrap_or(-1);
        vm.push(context);
        Ok(1)
    }

    // local x = suspend(1); return x
    fn suspending_script() -> Value {
        script(prototype(
            vec![
                abx(LOADK, 0, 0),
                abx(LOADK, 1, 1),
                abc(CALL, 0, 2, 2),
                abc(RETURN, 0, 2, 0),
            ],
            vec![native(suspend_with_args), 1.into()],
            2,
        ))
    }

    fn top_values(vm: &Vm, count: usize) -> Vec<String> {
        value_strings(&vm.values_from(vm.top() - count))
    }

    #[test]
    fn suspending_and_resuming_a_script() {
        let mut vm = test_vm();
        let mut thread = vm.new_thread();
        thread.push(suspending_script());

        let resumed = thread.resume(Some(&vm), 0).unwrap();

        assert_eq!(resumed, Resumed::Suspended(1));
        assert_eq!(thread.status(), ThreadStatus::Suspended);
        thread.transfer(&mut vm, 1).unwrap();
        assert_eq!(top_values(&vm, 1), ["1"]);

        thread.push(42);
        let resumed = thread.resume(Some(&vm), 1).unwrap();

        assert_eq!(resumed, Resumed::Finished(1));
        assert_eq!(thread.status(), ThreadStatus::Ok);
        assert_eq!(top_values(&thread, 1), ["42"]);
        assert_eq!(thread.depth(), 0);
    }

    #[test]
    fn a_native_main_function() {
        let vm = test_vm();
        let mut thread = vm.new_thread();
        thread.push(native(suspend_with_args));
        thread.push("a");
        thread.push("b");

        assert_eq!(thread.resume(Some(&vm), 2).unwrap(), Resumed::Suspended(2));
        assert_eq!(top_values(&thread, 2), ["a", "b"]);

        // The values passed to resume become the native function's results
        thread.push("c");
        assert_eq!(thread.resume(Some(&vm), 1).unwrap(), Resumed::Finished(1));
        assert_eq!(top_values(&thread, 1), ["c"]);
    }

    #[test]
    fn continuations_are_called_after_resuming() {
        let vm = test_vm();
        let mut thread = vm.new_thread();
        thread.push(native(|vm: &mut Vm| -> Result<usize> {
            let function = vm.top();
            vm.push(native(suspend_with_args));
            vm.push(5);
            vm.call_with_continuation(function, ResultCount::Exact(1), 7, continuation)?;
            continuation(vm)
        }));

        assert_eq!(thread.resume(None, 0).unwrap(), Resumed::Suspended(1));
        assert_eq!(top_values(&thread, 1), ["5"]);

        assert_eq!(thread.resume(None, 0).unwrap(), Resumed::Finished(1));
        assert_eq!(top_values(&thread, 1), ["7"]);
    }

    #[test]
    fn continuations_run_directly_when_not_suspended() {
        let mut vm = test_vm();
        let function = native(|vm: &mut Vm| -> Result<usize> {
            let function = vm.top();
            vm.push(native(|vm: &mut Vm| -> Result<usize> {
                vm.push("x");
                Ok(1)
            }));
            vm.call_with_continuation(function, ResultCount::Exact(1), 7, continuation)?;
            continuation(vm)
        });

        let values = call_function(&mut vm, function, &[], ResultCount::All).unwrap();

        // The continuation context is only available after resuming
        assert_eq!(value_strings(&values), ["-1"]);
    }

    #[test]
    fn suspending_with_a_continuation() {
        let vm = test_vm();
        let mut thread = vm.new_thread();
        thread.push(native(|vm: &mut Vm| -> Result<usize> {
            vm.suspend_with_continuation(0, 3, continuation)
        }));

        assert_eq!(thread.resume(None, 0).unwrap(), Resumed::Suspended(0));
        assert_eq!(thread.resume(None, 0).unwrap(), Resumed::Finished(1));
        assert_eq!(top_values(&thread, 1), ["3"]);
    }

    #[test]
    fn suspending_outside_of_a_coroutine() {
        let mut vm = test_vm();

        let result = call_function(&mut vm, native(suspend_with_args), &[], ResultCount::All);

        assert_eq!(
            result.unwrap_err().to_string(),
            "attempt to yield from outside a coroutine"
        );
    }

    #[test]
    fn suspending_across_a_native_call() {
        let vm = test_vm();
        let mut thread = vm.new_thread();
        thread.push(native(|vm: &mut Vm| -> Result<usize> {
            let function = vm.top();
            vm.push(native(suspend_with_args));
            vm.call(function, ResultCount::Exact(0), false)?;
            Ok(0)
        }));

        let error = thread.resume(Some(&vm), 0).unwrap_err();

        let message = "attempt to yield across a native-call boundary";
        assert_eq!(error.to_string(), message);
        assert_eq!(thread.status(), ThreadStatus::Failed);
        assert_eq!(top_values(&thread, 1), [message]);
        assert_eq!(thread.depth(), 0);
    }

    #[test]
    fn suspending_from_a_hook() {
        let vm = test_vm();
        let mut thread = vm.new_thread();
        thread.set_hook(
            |vm: &mut Vm, _: &DebugInfo| -> Result<()> { vm.suspend(0).map(|_| ()) },
            HookMask::CALL,
            0,
        );
        thread.push(native(|_: &mut Vm| -> Result<usize> { Ok(0) }));

        let error = thread.resume(Some(&vm), 0).unwrap_err();

        assert_eq!(
            error.to_string(),
            "attempt to yield across a native-call boundary"
        );
    }

    #[test]
    fn errors_kill_the_thread() {
        let vm = test_vm();
        let mut thread = vm.new_thread();
        thread.push(native(|_: &mut Vm| -> Result<usize> { runtime_error!("boom") }));

        let error = thread.resume(Some(&vm), 0).unwrap_err();

        assert_eq!(error.to_string(), "boom");
        assert_eq!(thread.status(), ThreadStatus::Failed);
        assert_eq!(
            thread.resume(Some(&vm), 0).unwrap_err().to_string(),
            "cannot resume dead coroutine"
        );
    }

    #[test]
    fn resuming_a_finished_thread() {
        let mut vm = test_vm();
        let mut thread = vm.new_thread();
        thread.push(native(|_: &mut Vm| -> Result<usize> { Ok(0) }));

        assert_eq!(thread.resume(Some(&vm), 0).unwrap(), Resumed::Finished(0));
        assert_eq!(thread.status(), ThreadStatus::Ok);

        let error = thread.resume(Some(&vm), 0).unwrap_err();
        assert_eq!(error.to_string(), "cannot resume dead coroutine");
        // Resume errors don't change the thread's status
        assert_eq!(thread.status(), ThreadStatus::Ok);
        thread.transfer(&mut vm, 0).unwrap();
    }

    #[test]
    fn threads_share_type_metatables() {
        let vm = test_vm();
        let metatable = TableRef::from(Table::from_iter([(
            "__call",
            native(|vm: &mut Vm| -> Result<usize> {
                vm.push("called");
                Ok(1)
            }),
        )]));
        vm.set_type_metatable(ValueType::Bool, Some(metatable));
        let mut thread = vm.new_thread();

        let values = call_function(&mut thread, true, &[], ResultCount::All).unwrap();

        assert_eq!(value_strings(&values), ["called"]);
        assert!(!thread.is_main_thread());
        assert!(vm.is_main_thread());
    }
}
