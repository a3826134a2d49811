mod upvalues {
    use wisp_runtime::{prelude::*, Upvalue, UpvalueDescriptor};
    use wisp_test_utils::{op::*, *};

    // function() x = x + 1 end
    fn increment() -> Ptr<Prototype> {
        Prototype {
            upvalues: vec![UpvalueDescriptor::local("x", 0)],
            ..prototype(
                vec![
                    abc(GETUPVAL, 0, 0, 0),
                    abc(ADD, 0, 0, k(0)),
                    abc(SETUPVAL, 0, 0, 0),
                    abc(RETURN, 0, 1, 0),
                ],
                vec![1.into()],
                2,
            )
        }
        .into()
    }

    // function() return x end
    fn get() -> Ptr<Prototype> {
        Prototype {
            upvalues: vec![UpvalueDescriptor::local("x", 0)],
            ..prototype(
                vec![abc(GETUPVAL, 0, 0, 0), abc(RETURN, 0, 2, 0)],
                vec![],
                2,
            )
        }
        .into()
    }

    fn call(vm: &mut Vm, function: &Value) -> Vec<String> {
        let values = call_function(vm, function.clone(), &[], ResultCount::All).unwrap();
        value_strings(&values)
    }

    #[test]
    fn writes_through_an_open_upvalue_reach_the_local() {
        let mut vm = test_vm();
        // local x = 10; local f = increment; f(); return x
        let outer = script(Prototype {
            prototypes: vec![increment()],
            ..prototype(
                vec![
                    abx(LOADK, 0, 0),
                    abx(CLOSURE, 1, 0),
                    abc(MOVE, 2, 1, 0),
                    abc(CALL, 2, 1, 1),
                    abc(RETURN, 0, 2, 0),
                ],
                vec![10.into()],
                3,
            )
        });

        assert_eq!(call(&mut vm, &outer), ["11"]);
        assert_eq!(vm.open_upvalue_count(), 0);
    }

    #[test]
    fn closures_share_captured_locals() {
        let mut vm = test_vm();
        // local x = 10; return increment, get
        let outer = script(Prototype {
            prototypes: vec![increment(), get()],
            ..prototype(
                vec![
                    abx(LOADK, 0, 0),
                    abx(CLOSURE, 1, 0),
                    abx(CLOSURE, 2, 1),
                    abc(RETURN, 1, 3, 0),
                ],
                vec![10.into()],
                3,
            )
        });

        let closures = call_function(&mut vm, outer, &[], ResultCount::All).unwrap();
        let [increment, get] = closures.as_slice() else {
            panic!("expected two closures");
        };

        // The local has gone out of scope, both closures keep sharing the closed upvalue
        assert_eq!(call(&mut vm, get), ["10"]);
        call(&mut vm, increment);
        call(&mut vm, increment);
        assert_eq!(call(&mut vm, get), ["12"]);
    }

    #[test]
    fn inherited_upvalues_are_shared_with_the_enclosing_closure() {
        let mut vm = test_vm();
        // function() return x end, capturing x from the enclosing closure's upvalues
        let get_inherited = Ptr::from(Prototype {
            upvalues: vec![UpvalueDescriptor::inherited("x", 0)],
            ..prototype(
                vec![abc(GETUPVAL, 0, 0, 0), abc(RETURN, 0, 2, 0)],
                vec![],
                2,
            )
        });
        // function() x = x + 1; return get_inherited end
        let middle = Ptr::from(Prototype {
            upvalues: vec![UpvalueDescriptor::local("x", 0)],
            prototypes: vec![get_inherited],
            ..prototype(
                vec![
                    abc(GETUPVAL, 0, 0, 0),
                    abc(ADD, 0, 0, k(0)),
                    abc(SETUPVAL, 0, 0, 0),
                    abx(CLOSURE, 0, 0),
                    abc(RETURN, 0, 2, 0),
                ],
                vec![1.into()],
                2,
            )
        });
        // local x = 1; return middle
        let outer = script(Prototype {
            prototypes: vec![middle],
            ..prototype(
                vec![
                    abx(LOADK, 0, 0),
                    abx(CLOSURE, 1, 0),
                    abc(RETURN, 1, 2, 0),
                ],
                vec![1.into()],
                2,
            )
        });

        let middle = call_function(&mut vm, outer, &[], ResultCount::All).unwrap();
        let inner = call_function(&mut vm, middle[0].clone(), &[], ResultCount::All).unwrap();

        assert_eq!(call(&mut vm, &inner[0]), ["2"]);
        call(&mut vm, &middle[0]);
        assert_eq!(call(&mut vm, &inner[0]), ["3"]);
    }

    #[test]
    fn closing_at_a_level() {
        let mut vm = test_vm();
        vm.check_stack(10).unwrap();
        for i in 0..10 {
            vm.push(i);
        }
        let upvalues: Vec<_> = [3, 5, 8].map(|index| vm.find_upvalue(index)).into();

        vm.close_upvalues(5);

        assert!(upvalues[0].is_open());
        assert!(!upvalues[1].is_open());
        assert!(!upvalues[2].is_open());
        assert_eq!(vm.open_upvalue_count(), 1);

        // Closed upvalues keep their values independently of the stack
        vm.set(5, "changed");
        assert_eq!(upvalues[1].get().to_string(), "4");
        // Open upvalues still refer to the stack
        vm.set(3, "changed");
        assert_eq!(upvalues[0].get().to_string(), "changed");

        // Closing again at the same level is a no-op
        vm.close_upvalues(5);
        assert_eq!(vm.open_upvalue_count(), 1);
    }

    #[test]
    fn upvalues_for_the_same_slot_are_shared() {
        let mut vm = test_vm();
        vm.push(1);

        let a = vm.find_upvalue(1);
        let b = vm.find_upvalue(1);

        assert!(Upvalue::ptr_eq(&a, &b));
        a.set(Value::from(99));
        assert_eq!(b.get().to_string(), "99");
        assert_eq!(vm.get(1).to_string(), "99");
    }

    #[test]
    fn jumps_can_close_upvalues() {
        let mut vm = test_vm();
        // local x = 10; local f = get; <close x>; x = 20; return f
        let outer = script(Prototype {
            prototypes: vec![get()],
            ..prototype(
                vec![
                    abx(LOADK, 0, 0),
                    abx(CLOSURE, 1, 0),
                    asbx(JMP, 1, 0),
                    abx(LOADK, 0, 1),
                    abc(RETURN, 1, 2, 0),
                ],
                vec![10.into(), 20.into()],
                2,
            )
        });

        let closure = call_function(&mut vm, outer, &[], ResultCount::All).unwrap();

        assert_eq!(call(&mut vm, &closure[0]), ["10"]);
    }

    mod closure_cache {
        use super::*;

        // local x; return get, get
        fn make_pair() -> Value {
            script(Prototype {
                prototypes: vec![get()],
                ..prototype(
                    vec![
                        abc(LOADNIL, 0, 0, 0),
                        abx(CLOSURE, 1, 0),
                        abx(CLOSURE, 2, 0),
                        abc(RETURN, 1, 3, 0),
                    ],
                    vec![],
                    3,
                )
            })
        }

        fn call_closures(vm: &mut Vm, function: &Value) -> Vec<Closure> {
            call_function(vm, function.clone(), &[], ResultCount::All)
                .unwrap()
                .iter()
                .map(|value| match value {
                    Value::Function(closure) => closure.clone(),
                    other => panic!("expected a function, found {other}"),
                })
                .collect()
        }

        #[test]
        fn identical_bindings_reuse_the_cached_closure() {
            let mut vm = test_vm();
            let outer = make_pair();

            let pair = call_closures(&mut vm, &outer);

            assert!(pair[0].ptr_eq(&pair[1]));
        }

        #[test]
        fn different_bindings_make_a_new_closure() {
            let mut vm = test_vm();
            let outer = make_pair();

            let first = call_closures(&mut vm, &outer);
            let second = call_closures(&mut vm, &outer);

            // The first activation's upvalue has been closed, so it can't be reused
            assert!(!first[0].ptr_eq(&second[0]));
            assert!(second[0].ptr_eq(&second[1]));
        }

        #[test]
        fn closures_without_upvalues_are_always_reused() {
            let mut vm = test_vm();
            let constant = Ptr::from(prototype(
                vec![abx(LOADK, 0, 0), abc(RETURN, 0, 2, 0)],
                vec![1.into()],
                1,
            ));
            let outer = script(Prototype {
                prototypes: vec![constant],
                ..prototype(
                    vec![abx(CLOSURE, 0, 0), abc(RETURN, 0, 2, 0)],
                    vec![],
                    1,
                )
            });

            let first = call_closures(&mut vm, &outer);
            let second = call_closures(&mut vm, &outer);

            assert!(first[0].ptr_eq(&second[0]));
        }

        #[test]
        fn the_cache_does_not_keep_closures_alive() {
            let mut vm = test_vm();
            let get = get();
            let outer = script(Prototype {
                prototypes: vec![get.clone()],
                ..prototype(
                    vec![
                        abc(LOADNIL, 0, 0, 0),
                        abx(CLOSURE, 1, 0),
                        abc(RETURN, 1, 2, 0),
                    ],
                    vec![],
                    2,
                )
            });

            let closure = call_function(&mut vm, outer, &[], ResultCount::All).unwrap();
            assert!(get.cache.get().is_some());

            drop(closure);
            // Clear the stack slots that still refer to the closure
            vm.check_stack(4).unwrap();
            let top = vm.top();
            for _ in 0..4 {
                vm.push(Value::Nil);
            }
            vm.set_top(top);

            assert!(get.cache.get().is_none());
        }

        #[test]
        fn too_many_upvalues() {
            let mut vm = Vm::with_settings(VmSettings {
                max_upvalues: 2,
                ..test_settings()
            });
            let nested = Ptr::from(Prototype {
                upvalues: (0..3)
                    .map(|i| UpvalueDescriptor::local("x", i))
                    .collect(),
                ..prototype(vec![abc(RETURN, 0, 1, 0)], vec![], 1)
            });

            let result = vm.instantiate(&nested, &[], 1);

            assert_eq!(
                result.unwrap_err().to_string(),
                "too many upvalues (limit is 2)"
            );
        }
    }
}
