//! End-to-end execution tests over synthetic images.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use common::{il, ImageBuilder};
use ilrun::{
    interpreter::SlotKind,
    Assembly, Error, Runtime, Token,
};

#[test]
fn entry_point_dispatch() {
    let mut builder = ImageBuilder::new("app");
    builder.add_type("N", "Program");
    let main = builder.add_method("Main", il::ret());
    builder.set_entry_point(main);

    let mut runtime = Runtime::new();
    let exit_code = runtime
        .run(Assembly::from_mem(builder.build()).unwrap())
        .unwrap();

    assert_eq!(exit_code, 0);
    assert!(runtime.stack().is_empty());
}

#[test]
fn constant_round_trip() {
    let mut builder = ImageBuilder::new("app");
    builder.add_type("N", "Program");
    let code = [
        il::ldc_i4(42),
        il::stloc_0(),
        il::ldloc_0(),
        il::pop(),
        il::ret(),
    ]
    .concat();
    let main = builder.add_method("Main", code);
    builder.set_entry_point(main);

    let mut runtime = Runtime::new();
    runtime
        .run(Assembly::from_mem(builder.build()).unwrap())
        .unwrap();

    assert!(runtime.stack().is_empty());
}

#[test]
fn long_form_locals() {
    let mut builder = ImageBuilder::new("app");
    builder.add_type("N", "Program");

    // ldc.i4 1; stloc 5 (0xFE 0x0E); ldloc 5 (0xFE 0x0C); pop; ret
    let mut code = il::ldc_i4(1);
    code.extend_from_slice(&[0xFE, 0x0E, 0x05, 0x00]);
    code.extend_from_slice(&[0xFE, 0x0C, 0x05, 0x00]);
    code.extend(il::pop());
    code.extend(il::ret());
    let main = builder.add_method("Main", code);
    builder.set_entry_point(main);

    let mut runtime = Runtime::new();
    runtime
        .run(Assembly::from_mem(builder.build()).unwrap())
        .unwrap();

    assert!(runtime.stack().is_empty());
}

#[test]
fn ldloc_of_empty_slot_fails() {
    let mut builder = ImageBuilder::new("app");
    builder.add_type("N", "Program");
    let main = builder.add_method("Main", [il::ldloc_0(), il::ret()].concat());
    builder.set_entry_point(main);

    let mut runtime = Runtime::new();
    let result = runtime.run(Assembly::from_mem(builder.build()).unwrap());

    assert!(matches!(result, Err(Error::TypeMismatch { .. })));
}

#[test]
fn ldloca_pushes_an_address() {
    let mut builder = ImageBuilder::new("app");
    builder.add_type("N", "Program");
    let code = [
        il::ldc_i4(3),
        il::stloc_0(),
        il::ldloca_s(0),
        il::pop(),
        il::ldloc_0(),
        il::pop(),
        il::ret(),
    ]
    .concat();
    let main = builder.add_method("Main", code);
    builder.set_entry_point(main);

    let mut runtime = Runtime::new();
    runtime
        .run(Assembly::from_mem(builder.build()).unwrap())
        .unwrap();

    assert!(runtime.stack().is_empty());
}

#[test]
fn static_field_first_access_triggers_cctor() {
    let mut builder = ImageBuilder::new("app");
    builder.add_type("N", "T");
    let field = builder.add_field("F");
    let ctor = builder.add_method(".ctor", il::ret());
    // Each .cctor run allocates one heap object, making repeat runs observable
    let cctor_code = [
        il::newobj(ctor),
        il::pop(),
        il::ldc_i4(7),
        il::stsfld(field),
        il::ret(),
    ]
    .concat();
    builder.add_method(".cctor", cctor_code);
    let second = builder.add_method("Second", [il::ldsfld(field), il::pop(), il::ret()].concat());
    let main_code = [
        il::ldsfld(field),
        il::pop(),
        il::call(second),
        il::ret(),
    ]
    .concat();
    let main = builder.add_method("Main", main_code);
    builder.set_entry_point(main);

    let mut runtime = Runtime::new();
    runtime
        .run(Assembly::from_mem(builder.build()).unwrap())
        .unwrap();

    // The type is initialized, the stored value is 7, and the .cctor ran exactly
    // once across two static accesses
    assert!(runtime.is_type_initialized("app", Token::new(0x0200_0001)));
    let slot = runtime.static_field("app", field).unwrap();
    assert_eq!(slot.kind(), SlotKind::Int32);
    assert_eq!(slot.bits(), 7);
    assert_eq!(runtime.heap().len(), 1);
    assert!(runtime.stack().is_empty());
}

#[test]
fn cross_assembly_call_via_loader() {
    // Assembly B: [B]N.T::M stores 7 into its own static field
    let mut b_builder = ImageBuilder::new("B");
    b_builder.add_type("N", "T");
    let b_field = b_builder.add_field("F");
    b_builder.add_method("M", [il::ldc_i4(7), il::stsfld(b_field), il::ret()].concat());
    let b_image = b_builder.build();

    // Assembly A: calls [B]N.T::M twice
    let mut a_builder = ImageBuilder::new("A");
    a_builder.add_type("P", "Program");
    let member = a_builder.add_member_ref("B", "N", "T", "M");
    let main = a_builder.add_method(
        "Main",
        [il::call(member), il::call(member), il::ret()].concat(),
    );
    a_builder.set_entry_point(main);

    let loader_calls = Rc::new(Cell::new(0_usize));
    let loader_counter = loader_calls.clone();

    let mut runtime = Runtime::new();
    runtime.add_assembly_loader(move |name| {
        loader_counter.set(loader_counter.get() + 1);
        if name == "B" {
            Assembly::from_mem(b_image.clone()).ok()
        } else {
            None
        }
    });

    runtime
        .run(Assembly::from_mem(a_builder.build()).unwrap())
        .unwrap();

    // The loader resolved B exactly once; the second call hit the registry
    assert_eq!(loader_calls.get(), 1);

    // M executed: B's static field holds 7
    let slot = runtime.static_field("B", b_field).unwrap();
    assert_eq!(slot.bits(), 7);
    assert!(runtime.stack().is_empty());
}

#[test]
fn missing_assembly_fails() {
    let mut builder = ImageBuilder::new("A");
    builder.add_type("P", "Program");
    let member = builder.add_member_ref("Nowhere", "N", "T", "M");
    let main = builder.add_method("Main", [il::call(member), il::ret()].concat());
    builder.set_entry_point(main);

    let mut runtime = Runtime::new();
    let result = runtime.run(Assembly::from_mem(builder.build()).unwrap());

    assert!(matches!(result, Err(Error::AssemblyNotFound(name)) if name == "Nowhere"));
}

#[test]
fn missing_method_fails() {
    let mut b_builder = ImageBuilder::new("B");
    b_builder.add_type("N", "T");
    b_builder.add_method("M", il::ret());
    let b_image = b_builder.build();

    let mut a_builder = ImageBuilder::new("A");
    a_builder.add_type("P", "Program");
    let member = a_builder.add_member_ref("B", "N", "T", "DoesNotExist");
    let main = a_builder.add_method("Main", [il::call(member), il::ret()].concat());
    a_builder.set_entry_point(main);

    let mut runtime = Runtime::new();
    runtime.add_assembly_loader(move |name| {
        (name == "B")
            .then(|| Assembly::from_mem(b_image.clone()).ok())
            .flatten()
    });

    let result = runtime.run(Assembly::from_mem(a_builder.build()).unwrap());
    assert!(matches!(result, Err(Error::MethodNotFound(_))));
}

#[test]
fn unknown_opcode_aborts() {
    let mut builder = ImageBuilder::new("app");
    builder.add_type("N", "Program");
    let main = builder.add_method("Main", vec![0x00, 0xFF]); // nop; <reserved>
    builder.set_entry_point(main);

    let mut runtime = Runtime::new();
    let result = runtime.run(Assembly::from_mem(builder.build()).unwrap());

    assert!(matches!(
        result,
        Err(Error::Unimplemented {
            prefix: 0,
            opcode: 0xFF
        })
    ));

    // No partial state beyond the point of failure
    assert!(runtime.stack().is_empty());
    assert!(runtime.heap().is_empty());
}

#[test]
fn branch_skips_dead_code() {
    let mut builder = ImageBuilder::new("app");
    builder.add_type("N", "T");
    let field = builder.add_field("F");

    // br.s +3 skips the ldc.i4.s 99 / ret pair; execution resumes at ldc.i4.s 7
    let code = [
        il::br_s(3),
        il::ldc_i4_s(99),
        il::ret(),
        il::ldc_i4_s(7),
        il::stsfld(field),
        il::ret(),
    ]
    .concat();
    let main = builder.add_method("Main", code);
    builder.set_entry_point(main);

    let mut runtime = Runtime::new();
    runtime
        .run(Assembly::from_mem(builder.build()).unwrap())
        .unwrap();

    let slot = runtime.static_field("app", field).unwrap();
    assert_eq!(slot.bits(), 7);

    // No leftover slots from the skipped ldc.i4.s 99
    assert!(runtime.stack().is_empty());
}

#[test]
fn ldstr_pushes_the_token() {
    let mut builder = ImageBuilder::new("app");
    builder.add_type("N", "Program");
    let literal = builder.add_user_string("Hello, World!");
    let main = builder.add_method("Main", [il::ldstr(literal), il::pop(), il::ret()].concat());
    builder.set_entry_point(main);

    let mut runtime = Runtime::new();
    runtime
        .run(Assembly::from_mem(builder.build()).unwrap())
        .unwrap();

    assert!(runtime.stack().is_empty());
}

#[test]
fn newobj_allocates_with_explicit_layout() {
    let mut builder = ImageBuilder::new("app");
    builder.add_type("N", "T");
    builder.set_class_size(16);
    let ctor = builder.add_method(".ctor", il::ret());
    let main = builder.add_method("Main", [il::newobj(ctor), il::pop(), il::ret()].concat());
    builder.set_entry_point(main);

    let mut runtime = Runtime::new();
    runtime
        .run(Assembly::from_mem(builder.build()).unwrap())
        .unwrap();

    assert_eq!(runtime.heap().len(), 1);
    assert_eq!(runtime.heap().get(0).unwrap().len(), 16);
    assert!(runtime.stack().is_empty());
}

#[test]
fn heap_keys_never_alias() {
    let mut builder = ImageBuilder::new("app");
    builder.add_type("N", "T");
    let ctor = builder.add_method(".ctor", il::ret());
    let code = [
        il::newobj(ctor),
        il::pop(),
        il::newobj(ctor),
        il::pop(),
        il::ret(),
    ]
    .concat();
    let main = builder.add_method("Main", code);
    builder.set_entry_point(main);

    let mut runtime = Runtime::new();
    runtime
        .run(Assembly::from_mem(builder.build()).unwrap())
        .unwrap();

    assert_eq!(runtime.heap().len(), 2);
}

#[test]
fn call_token_of_unsupported_table_fails() {
    let mut builder = ImageBuilder::new("app");
    builder.add_type("N", "Program");
    let bogus = Token::new(0x0100_0001); // a TypeRef token
    let main = builder.add_method("Main", [il::call(bogus), il::ret()].concat());
    builder.set_entry_point(main);

    let mut runtime = Runtime::new();
    let result = runtime.run(Assembly::from_mem(builder.build()).unwrap());

    assert!(matches!(result, Err(Error::BadCall(token)) if token == bogus));
}
