//! Unit tests for the schema and query model built from SQL text

use sql_sharpen::load_model_from_sql;
use sql_sharpen::model::{BuiltModel, Provenance, SchemaModel};

const TB1_TB2: &str = "create table tb1 (id int primary key, col1 int not null)
go
create table tb2 (tb1Id int foreign key references tb1(id), col2 int not null)
go
";

fn model(sources: &[&str]) -> SchemaModel {
    let BuiltModel { model, failures } = load_model_from_sql(sources, "").unwrap();
    assert!(failures.is_empty(), "unexpected failures: {:?}", failures);
    model
}

fn nullability(model: &SchemaModel, procedure: &str) -> Vec<(String, bool)> {
    model.procedure(procedure).unwrap().selects[0]
        .columns
        .iter()
        .map(|c| (c.name.clone(), c.is_nullable))
        .collect()
}

// ============================================================================
// Relationships
// ============================================================================

#[test]
fn test_single_foreign_key_relationship_lists() {
    let model = model(&[TB1_TB2]);
    let tb1 = model.table("dbo", "tb1").unwrap();
    let tb2 = model.table("dbo", "tb2").unwrap();

    let id = tb1.column("id").unwrap();
    assert_eq!(id.child_relationships.len(), 1);
    assert_eq!(id.child_relationships[0].table_or_view, "tb2");
    assert_eq!(id.child_relationships[0].columns, vec!["tb1Id"]);

    let tb1_id = tb2.column("tb1Id").unwrap();
    assert_eq!(tb1_id.parent_relationships.len(), 1);
    assert_eq!(tb1_id.parent_relationships[0].table_or_view, "tb1");
    assert_eq!(tb1_id.parent_relationships[0].columns, vec!["id"]);

    let total: usize = tb1
        .columns
        .iter()
        .chain(tb2.columns.iter())
        .map(|c| c.parent_relationships.len() + c.child_relationships.len())
        .sum();
    assert_eq!(total, 2);
}

#[test]
fn test_foreign_key_flag_follows_parent_relationships() {
    let model = model(&[TB1_TB2]);
    for table in &model.tables {
        for column in &table.columns {
            assert_eq!(
                column.is_foreign_key,
                !column.parent_relationships.is_empty(),
                "{}.{}",
                table.name,
                column.name
            );
        }
    }
}

#[test]
fn test_tables_may_reference_tables_declared_later() {
    let model = model(&[
        "create table child (parentId int, constraint FK_child foreign key (parentId) references parent (id))",
        "create table parent (id int primary key)",
    ]);
    let id = model.table("dbo", "parent").unwrap().column("id").unwrap();
    assert_eq!(id.child_relationships.len(), 1);
}

// ============================================================================
// Nullability
// ============================================================================

#[test]
fn test_left_join_scenario() {
    let model = model(&[
        TB1_TB2,
        "create procedure p as select col1, col2 from tb1 left join tb2 on tb1.id = tb2.tb1Id",
    ]);
    assert_eq!(
        nullability(&model, "p"),
        vec![("col1".to_string(), false), ("col2".to_string(), true)]
    );
}

#[test]
fn test_right_join_forces_left_side() {
    let model = model(&[
        TB1_TB2,
        "create procedure p as select col1, col2 from tb1 right join tb2 on tb1.id = tb2.tb1Id",
    ]);
    assert_eq!(
        nullability(&model, "p"),
        vec![("col1".to_string(), true), ("col2".to_string(), false)]
    );
}

#[test]
fn test_inner_join_inside_optional_side_is_optional() {
    let model = model(&[
        TB1_TB2,
        "create table tb3 (tb2Col int not null, col3 int not null)",
        "create procedure p as
            select t1.col1, t2.col2, t3.col3
            from tb1 t1
            left join (tb2 t2 inner join tb3 t3 on t3.tb2Col = t2.col2) on t2.tb1Id = t1.id",
    ]);
    assert_eq!(
        nullability(&model, "p"),
        vec![
            ("col1".to_string(), false),
            ("col2".to_string(), true),
            ("col3".to_string(), true)
        ]
    );
}

#[test]
fn test_inner_join_chained_to_left_join_is_optional() {
    let model = model(&[
        TB1_TB2,
        "create table tb3 (tb2Id int not null, col3 int not null)",
        "create procedure p as
            select tb1.col1, tb3.col3
            from tb1
            left join tb2 on tb1.id = tb2.tb1Id
            join tb3 on tb3.tb2Id = tb2.col2",
    ]);
    assert_eq!(
        nullability(&model, "p"),
        vec![("col1".to_string(), false), ("col3".to_string(), true)]
    );
}

#[test]
fn test_inner_join_to_required_side_after_left_join_stays_required() {
    let model = model(&[
        TB1_TB2,
        "create table tb3 (tb1Id int not null, col3 int not null)",
        "create procedure p as
            select tb2.col2, tb3.col3
            from tb1
            left join tb2 on tb1.id = tb2.tb1Id
            join tb3 on tb3.tb1Id = tb1.id",
    ]);
    assert_eq!(
        nullability(&model, "p"),
        vec![("col2".to_string(), true), ("col3".to_string(), false)]
    );
}

#[test]
fn test_required_side_keeps_declared_nullability() {
    let model = model(&[
        "create table a (id int primary key, maybe int null, surely int not null)",
        "create table b (aId int not null)",
        "create procedure p as select a.maybe, a.surely, b.aId from a inner join b on b.aId = a.id",
    ]);
    assert_eq!(
        nullability(&model, "p"),
        vec![
            ("maybe".to_string(), true),
            ("surely".to_string(), false),
            ("aId".to_string(), false)
        ]
    );
}

#[test]
fn test_untraceable_columns_are_unknown_and_nullable() {
    let model = model(&[
        TB1_TB2,
        "create procedure p @x int as
            select @x as X, getdate() as Now, col1 + 1 as Next, t.anything
            from tb1 cross join #work t",
    ]);
    let select = &model.procedure("p").unwrap().selects[0];
    for column in &select.columns {
        assert!(column.is_nullable, "{}", column.name);
        assert!(column.data_type.is_unknown(), "{}", column.name);
    }
    assert_eq!(
        select.columns[0].provenance,
        Provenance::Variable {
            name: "x".to_string()
        }
    );
    assert_eq!(select.columns[1].provenance, Provenance::Expression);
    assert!(matches!(
        select.columns[3].provenance,
        Provenance::OpaqueSource { .. }
    ));
}

// ============================================================================
// Derived sources
// ============================================================================

#[test]
fn test_values_source_is_unknown_and_nullable() {
    let model = model(&[
        TB1_TB2,
        "create procedure p as
            select v.x, tb1.col1
            from (values (1), (2)) v(x)
            join tb1 on tb1.id = v.x",
    ]);
    let select = &model.procedure("p").unwrap().selects[0];
    assert_eq!(select.columns[0].name, "x");
    assert!(select.columns[0].data_type.is_unknown());
    assert!(select.columns[0].is_nullable);
    assert_eq!(select.columns[1].data_type.source_name, "int");
    assert!(!select.columns[1].is_nullable);
}

#[test]
fn test_values_source_without_column_list_uses_positional_names() {
    let model = model(&["create procedure p as select v.* from (values (1, 'a')) v"]);
    let names: Vec<&str> = model.procedure("p").unwrap().selects[0]
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(names, vec!["Column1", "Column2"]);
}

#[test]
fn test_repeated_column_names_are_suffixed() {
    let model = model(&[
        TB1_TB2,
        "create procedure p as select a.*, b.* from tb1 a join tb1 b on b.id = a.id",
    ]);
    let select = &model.procedure("p").unwrap().selects[0];
    let names: Vec<&str> = select.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "col1", "id2", "col12"]);
    assert_eq!(
        select.columns[2].provenance,
        Provenance::Column {
            source: "tb1".to_string(),
            column: "id".to_string()
        }
    );
}

// ============================================================================
// Parameters and selects
// ============================================================================

#[test]
fn test_table_valued_parameter_scenario() {
    let model = model(&[
        "create type tbInput as table(id int not null, col1 int null)",
        "create procedure p @tbInput tbInput readonly as select 1",
    ]);
    let parameter = &model.procedure("p").unwrap().parameters[0];
    assert!(parameter.scalar_type().is_none());

    let shape = parameter.table_value().unwrap();
    let columns: Vec<(&str, bool)> = shape
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.is_nullable))
        .collect();
    assert_eq!(columns, vec![("id", false), ("col1", true)]);
}

#[test]
fn test_scalar_parameters_have_no_table_shape() {
    let model = model(&["create procedure p @a int, @b nvarchar(20) output as select 1"]);
    for parameter in &model.procedure("p").unwrap().parameters {
        assert!(parameter.table_value().is_none());
        assert!(parameter.scalar_type().is_some());
    }
}

#[test]
fn test_three_way_union_is_one_select() {
    let model = model(&[
        TB1_TB2,
        "create procedure p as
            select id from tb1
            union select tb1Id from tb2
            union all select 5",
    ]);
    let selects = &model.procedure("p").unwrap().selects;
    assert_eq!(selects.len(), 1);
    assert_eq!(selects[0].columns.len(), 1);
    assert_eq!(selects[0].columns[0].name, "id");
}

#[test]
fn test_scope_identity_is_single_row() {
    let model = model(&[
        TB1_TB2,
        "create procedure p @col1 int as
            insert into tb1 (col1) values (@col1)
            select cast(scope_identity() as int)",
    ]);
    let select = &model.procedure("p").unwrap().selects[0];
    assert!(select.is_single_row);
    assert_eq!(select.columns[0].name, "Column1");
}

#[test]
fn test_view_star_and_expression_columns() {
    let model = model(&[
        TB1_TB2,
        "create view vStar as select * from tb1",
        "create view vExpr as select col1 * 2 as doubled from tb1",
    ]);
    assert_eq!(model.view("dbo", "vStar").unwrap().columns.len(), 2);

    let expr = model.view("dbo", "vExpr").unwrap();
    assert_eq!(expr.columns.len(), 1);
    assert_eq!(expr.columns[0].name, "doubled");
    assert!(expr.columns[0].data_type.is_unknown());
}

#[test]
fn test_select_through_view_keeps_column_types() {
    let model = model(&[
        TB1_TB2,
        "create view v as select t1.col1, t2.col2 from tb1 t1 left join tb2 t2 on t2.tb1Id = t1.id",
        "create procedure p as select col1, col2 from v",
    ]);
    let select = &model.procedure("p").unwrap().selects[0];
    assert_eq!(select.columns[0].data_type.source_name, "int");
    // The view carries the outer join's nullability into its own columns
    assert!(!select.columns[0].is_nullable);
    assert!(select.columns[1].is_nullable);
}

#[test]
fn test_alias_collision_scopes_failure_to_procedure() {
    let BuiltModel { model, failures } = load_model_from_sql(
        &[
            TB1_TB2,
            "create procedure bad as select x.col1 from tb1 x join tb2 x on 1 = 1",
            "create procedure good as select col1 from tb1",
        ],
        "",
    )
    .unwrap();
    assert_eq!(model.procedures.len(), 1);
    assert_eq!(failures.len(), 1);
    let message = failures[0].to_string();
    assert!(message.contains("bad"), "{}", message);
}
