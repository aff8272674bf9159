//! End-to-end image loading and metadata access tests over synthetic images.

mod common;

use std::io::Write;

use common::{il, ImageBuilder};
use ilrun::{
    metadata::tables::{MethodDefRaw, TableId, TypeDefRaw},
    Assembly, Error, Token,
};

fn sample_image() -> Vec<u8> {
    let mut builder = ImageBuilder::new("sample");
    builder.add_type("Lib", "Helper");
    builder.add_method("Assist", il::ret());
    builder.add_type("App", "Program");
    builder.add_field("Counter");
    builder.add_method("Main", [il::ldc_i4(1), il::pop(), il::ret()].concat());
    builder.add_method("Other", il::ret());
    builder.set_entry_point(Token::new(0x0600_0002));
    builder.build()
}

#[test]
fn loads_and_exposes_basics() {
    let assembly = Assembly::from_mem(sample_image()).unwrap();

    assert_eq!(assembly.module_name().unwrap(), "sample");
    assert_eq!(assembly.entry_point(), Token::new(0x0600_0002));
    assert_eq!(assembly.stack_reserve(), 0x10_0000);
    assert_eq!(assembly.root().version, "v4.0.30319");
    assert_eq!(assembly.cor20().cb, 72);
}

#[test]
fn from_path_round_trip() {
    let image = sample_image();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&image).unwrap();
    file.flush().unwrap();

    let assembly = Assembly::from_path(file.path()).unwrap();
    assert_eq!(assembly.module_name().unwrap(), "sample");
}

#[test]
fn row_access_by_token() {
    let assembly = Assembly::from_mem(sample_image()).unwrap();

    assert_eq!(assembly.row_count(TableId::TypeDef), 2);
    assert_eq!(assembly.row_count(TableId::MethodDef), 3);
    assert_eq!(assembly.row_count(TableId::Field), 1);

    // A token resolves iff its table matches and the row index is in range
    let method = assembly
        .row::<MethodDefRaw>(Token::new(0x0600_0001))
        .unwrap();
    assert_eq!(assembly.string(method.name).unwrap(), "Assist");

    let wrong_table = assembly.row::<MethodDefRaw>(Token::new(0x0200_0001));
    assert!(matches!(wrong_table, Err(Error::MissingRow(_))));

    let zero_row = assembly.row::<MethodDefRaw>(Token::new(0x0600_0000));
    assert!(matches!(zero_row, Err(Error::MissingRow(_))));

    let out_of_range = assembly.row::<MethodDefRaw>(Token::new(0x0600_0004));
    assert!(matches!(out_of_range, Err(Error::MissingRow(_))));
}

#[test]
fn range_list_joins() {
    let assembly = Assembly::from_mem(sample_image()).unwrap();

    // Method 1 belongs to the first type
    let owner = assembly.type_def_of_method(1).unwrap();
    assert_eq!(assembly.string(owner.type_name).unwrap(), "Helper");

    // Methods 2 and 3 lie in the last TypeDef, which extends through the end of
    // the MethodDef table
    let owner = assembly.type_def_of_method(2).unwrap();
    assert_eq!(assembly.string(owner.type_name).unwrap(), "Program");
    let owner = assembly.type_def_of_method(3).unwrap();
    assert_eq!(assembly.string(owner.type_name).unwrap(), "Program");

    // The single field belongs to the second type
    let owner = assembly.type_def_of_field(1).unwrap();
    assert_eq!(assembly.string(owner.type_name).unwrap(), "Program");
}

#[test]
fn method_lookup_by_name() {
    let assembly = Assembly::from_mem(sample_image()).unwrap();

    let main = assembly
        .method_by_name("App", "Program", "Main")
        .unwrap()
        .unwrap();
    assert_eq!(main.token, Token::new(0x0600_0002));

    let assist = assembly
        .method_by_name("Lib", "Helper", "Assist")
        .unwrap()
        .unwrap();
    assert_eq!(assist.token, Token::new(0x0600_0001));

    assert!(assembly
        .method_by_name("App", "Program", "Missing")
        .unwrap()
        .is_none());
    assert!(assembly
        .method_by_name("Nope", "Program", "Main")
        .unwrap()
        .is_none());

    let program = assembly.row::<TypeDefRaw>(Token::new(0x0200_0002)).unwrap();
    let other = assembly.method_of_type(&program, "Other").unwrap().unwrap();
    assert_eq!(other.token, Token::new(0x0600_0003));
}

#[test]
fn method_bodies_decode() {
    let assembly = Assembly::from_mem(sample_image()).unwrap();

    let main = assembly
        .row::<MethodDefRaw>(Token::new(0x0600_0002))
        .unwrap();
    let (body, code) = assembly.method_body(&main).unwrap();

    assert!(!body.is_fat);
    assert_eq!(body.size_header, 1);
    let expected = [il::ldc_i4(1), il::pop(), il::ret()].concat();
    assert_eq!(code, expected.as_slice());
}

#[test]
fn section_mapping() {
    let assembly = Assembly::from_mem(sample_image()).unwrap();

    let section = assembly.section_at_rva(0x1000).unwrap();
    assert_eq!(section.name_str(), ".text");

    // Every RVA within the virtual range maps to this section
    let last = section.virtual_address + section.virtual_size - 1;
    assert!(assembly.section_at_rva(last).is_some());
    assert!(assembly.section_at_rva(last + 1).is_none());
    assert!(assembly.section_at_rva(0x0FFF).is_none());

    // Reads past the virtual size are refused
    let bytes = assembly.section_bytes(section, 0x1000, 72).unwrap();
    assert_eq!(bytes.len(), 72);
    assert!(assembly
        .section_bytes(section, last, 2)
        .is_err());
}

#[test]
fn user_strings_decode() {
    let mut builder = ImageBuilder::new("app");
    builder.add_type("N", "Program");
    let literal = builder.add_user_string("Hello, World!");
    let empty = builder.add_user_string("");
    let main = builder.add_method("Main", il::ret());
    builder.set_entry_point(main);

    let assembly = Assembly::from_mem(builder.build()).unwrap();

    assert_eq!(
        assembly.user_string(literal.row()).unwrap(),
        "Hello, World!"
    );
    assert_eq!(assembly.user_string(empty.row()).unwrap(), "");
}

#[test]
fn qualified_member_names_resolve() {
    let mut builder = ImageBuilder::new("A");
    builder.add_type("P", "Program");
    let member = builder.add_member_ref("B", "N", "T", "M");
    let main = builder.add_method("Main", il::ret());
    builder.set_entry_point(main);

    let assembly = Assembly::from_mem(builder.build()).unwrap();

    let qualified = assembly.qualified_member_name(member).unwrap();
    assert_eq!(qualified.assembly_name, "B");
    assert_eq!(qualified.namespace, "N");
    assert_eq!(qualified.type_name, "T");
    assert_eq!(qualified.member_name, "M");
    assert_eq!(qualified.to_string(), "[B]N.T::M");

    let not_a_member_ref = assembly.qualified_member_name(Token::new(0x0600_0001));
    assert!(not_a_member_ref.is_err());
}

#[test]
fn class_layouts_resolve() {
    let mut builder = ImageBuilder::new("app");
    builder.add_type("N", "Fixed");
    builder.set_class_size(24);
    builder.add_method(".ctor", il::ret());
    builder.add_type("N", "Auto");
    let main = builder.add_method("Main", il::ret());
    builder.set_entry_point(main);

    let assembly = Assembly::from_mem(builder.build()).unwrap();

    let layout = assembly.class_layout_of_type(1).unwrap();
    assert_eq!(layout.class_size, 24);
    assert_eq!(layout.parent, 1);
    assert_eq!(assembly.type_size(1), 24);

    assert!(assembly.class_layout_of_type(2).is_none());
    assert_eq!(assembly.type_size(2), 8);
}

#[test]
fn truncated_image_is_rejected() {
    let image = sample_image();

    // Cutting into the metadata must surface a structured error, not a panic
    let truncated = image[..0x240].to_vec();
    assert!(Assembly::from_mem(truncated).is_err());

    assert!(matches!(Assembly::from_mem(Vec::new()), Err(Error::Empty)));
}

#[test]
fn non_pe_data_is_rejected() {
    let garbage = vec![0x42_u8; 4096];
    assert!(Assembly::from_mem(garbage).is_err());
}
