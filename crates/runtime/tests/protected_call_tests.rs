mod protected_calls {
    use wisp_runtime::{prelude::*, UpvalueDescriptor};
    use wisp_test_utils::{op::*, *};

    fn fail(_: &mut Vm) -> Result<usize> {
        runtime_error!("boom")
    }

    fn protected_call(vm: &mut Vm, function: Value) -> Result<Option<Error>> {
        let position = vm.top();
        vm.push(function);
        vm.protected_call(position, ResultCount::All)
    }

    #[test]
    fn successful_calls_return_their_results() {
        let mut vm = test_vm();
        let position = vm.top();
        vm.push(native(|vm: &mut Vm| -> Result<usize> {
            vm.push(1);
            vm.push(2);
            Ok(2)
        }));

        let result = vm.protected_call(position, ResultCount::All).unwrap();

        assert!(result.is_none());
        assert_eq!(value_strings(&vm.values_from(position)), ["1", "2"]);
    }

    #[test]
    fn errors_are_caught() {
        let mut vm = test_vm();
        let position = vm.top();

        let error = protected_call(&mut vm, native(fail)).unwrap().unwrap();

        assert_eq!(error.to_string(), "boom");
        assert_eq!(vm.top(), position + 1);
        assert_eq!(vm.get(position).to_string(), "boom");
        assert_eq!(vm.depth(), 0);
        assert_eq!(vm.native_call_depth(), 0);
    }

    #[test]
    fn script_frames_are_unwound_and_their_upvalues_closed() {
        let mut vm = test_vm();
        let stash = PtrMut::from(Value::Nil);
        let stash_and_fail = {
            let stash = stash.clone();
            native(move |vm: &mut Vm| -> Result<usize> {
                *stash.borrow_mut() = vm.arg(0);
                runtime_error!("boom")
            })
        };
        let get = Ptr::from(Prototype {
            upvalues: vec![UpvalueDescriptor::local("x", 0)],
            ..prototype(
                vec![abc(GETUPVAL, 0, 0, 0), abc(RETURN, 0, 2, 0)],
                vec![],
                2,
            )
        });
        // local x = 7; stash_and_fail(function() return x end)
        let function = script(Prototype {
            prototypes: vec![get],
            ..prototype(
                vec![
                    abx(LOADK, 0, 0),
                    abx(LOADK, 1, 1),
                    abx(CLOSURE, 2, 0),
                    abc(CALL, 1, 2, 1),
                    abc(RETURN, 0, 1, 0),
                ],
                vec![7.into(), stash_and_fail],
                3,
            )
        });

        let error = protected_call(&mut vm, function).unwrap().unwrap();

        assert_eq!(error.to_string(), "boom");
        assert_eq!(vm.depth(), 0);
        assert_eq!(vm.open_upvalue_count(), 0);

        let closure = stash.borrow().clone();
        let values = call_function(&mut vm, closure, &[], ResultCount::All).unwrap();
        assert_eq!(value_strings(&values), ["7"]);
    }

    #[test]
    fn type_errors() {
        let mut vm = test_vm();

        let error = protected_call(&mut vm, Value::from(true)).unwrap().unwrap();

        assert!(matches!(
            error.kind(),
            ErrorKind::TypeError {
                operation: "call",
                type_name: "boolean"
            }
        ));
        assert_eq!(error.to_string(), "attempt to call a boolean value");
    }

    #[test]
    fn thrown_values() {
        let mut vm = test_vm();
        let throw_table = native(|_: &mut Vm| -> Result<usize> {
            Err(Error::from_value(Value::Table(Table::new().into())))
        });

        let error = protected_call(&mut vm, throw_table).unwrap().unwrap();

        assert!(matches!(error.value(), Value::Table(_)));
        assert!(matches!(vm.get(vm.top() - 1), Value::Table(_)));
    }

    #[test]
    fn the_stack_shrinks_after_an_overflow() {
        let mut vm = Vm::with_settings(VmSettings {
            max_stack: 200,
            ..test_settings()
        });
        let grow = native(|vm: &mut Vm| -> Result<usize> {
            vm.check_stack(500)?;
            Ok(0)
        });

        let error = protected_call(&mut vm, grow).unwrap().unwrap();

        assert!(error.is_stack_overflow());
        assert_eq!(error.to_string(), "stack overflow");
        assert!(vm.stack_size() < 200);
    }

    mod error_handlers {
        use super::*;

        fn prefix_message(vm: &mut Vm) -> Result<usize> {
            let message = vm.arg(0);
            vm.push(format!("handled: {message}"));
            Ok(1)
        }

        #[test]
        fn the_handler_replaces_the_error_value() {
            let mut vm = test_vm();
            vm.set_error_handler(Some(native(prefix_message)));

            let error = protected_call(&mut vm, native(fail)).unwrap().unwrap();

            assert_eq!(error.to_string(), "handled: boom");
            assert_eq!(vm.get(vm.top() - 1).to_string(), "handled: boom");
        }

        #[test]
        fn the_handler_runs_before_unwinding() {
            let mut vm = test_vm();
            let depth = PtrMut::from(0);
            let record_depth = {
                let depth = depth.clone();
                native(move |vm: &mut Vm| -> Result<usize> {
                    *depth.borrow_mut() = vm.depth();
                    vm.push(vm.arg(0));
                    Ok(1)
                })
            };
            vm.set_error_handler(Some(record_depth));
            // A script function that calls the failing function
            let function = script(prototype(
                vec![
                    abx(LOADK, 0, 0),
                    abc(CALL, 0, 1, 1),
                    abc(RETURN, 0, 1, 0),
                ],
                vec![native(fail)],
                1,
            ));

            protected_call(&mut vm, function).unwrap().unwrap();

            // script frame -> failing native frame -> handler frame
            assert_eq!(*depth.borrow(), 3);
        }

        #[test]
        fn failing_handlers_are_fatal() {
            let mut vm = Vm::with_settings(VmSettings {
                max_native_calls: 40,
                ..test_settings()
            });
            vm.set_error_handler(Some(native(fail)));

            let error = protected_call(&mut vm, native(fail)).unwrap_err();

            assert!(matches!(error.kind(), ErrorKind::ErrorInErrorHandling));
            assert!(!error.is_recoverable());
            assert_eq!(vm.depth(), 0);
            assert_eq!(vm.native_call_depth(), 0);
        }

        #[test]
        fn replacing_the_handler_returns_the_previous_one() {
            let mut vm = test_vm();

            assert!(vm.set_error_handler(Some(native(fail))).is_none());
            assert!(vm.set_error_handler(None).is_some());
            assert!(vm.error_handler().is_none());
        }
    }
}
