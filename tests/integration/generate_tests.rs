//! Integration tests for the generate workflow
//!
//! Each test copies the `sales_db` fixture (or writes loose SQL files) into a
//! temp directory and runs the whole pipeline: project, parser, model, planner.

use pretty_assertions::assert_eq;
use sql_sharpen::model::Provenance;
use sql_sharpen::plan::{ExecutionPlan, ParameterBinding, ReturnShape};
use sql_sharpen::{generate, GenerateOptions, SqlSharpenError};

use crate::common::{plan, procedure, TestContext};

// ============================================================================
// Schema model
// ============================================================================

#[test]
fn test_fixture_builds_complete_model() {
    let ctx = TestContext::with_fixture("sales_db");
    let generated = ctx.generate_successfully();
    let model = &generated.model;

    assert!(generated.failures.is_empty(), "{:?}", generated.failures);
    assert_eq!(model.default_schema, "dbo");
    assert_eq!(model.tables.len(), 3);
    assert_eq!(model.views.len(), 2);
    assert_eq!(model.table_types.len(), 1);
    assert_eq!(model.alias_types.len(), 1);
    assert_eq!(model.procedures.len(), 7);
    assert_eq!(generated.plans.len(), 7);
}

#[test]
fn test_alias_typed_column_takes_base_type_and_nullability() {
    let ctx = TestContext::with_fixture("sales_db");
    let model = ctx.generate_successfully().model;

    let email = model.table("dbo", "Customers").unwrap().column("Email").unwrap();
    assert_eq!(email.data_type.source_name, "nvarchar");
    assert_eq!(email.length, Some(256));
    assert!(!email.is_nullable);
}

#[test]
fn test_foreign_keys_link_both_columns() {
    let ctx = TestContext::with_fixture("sales_db");
    let model = ctx.generate_successfully().model;
    assert_eq!(model.relationships.len(), 2);

    let customer_id = model.table("dbo", "Customers").unwrap().column("Id").unwrap();
    assert!(customer_id.is_primary_key);
    assert_eq!(customer_id.child_relationships.len(), 1);
    assert_eq!(customer_id.child_relationships[0].table_or_view, "Orders");
    assert_eq!(customer_id.child_relationships[0].columns, vec!["CustomerId"]);

    // ALTER TABLE ... REFERENCES [dbo].[Orders] without a column list
    let order_id = model.table("dbo", "OrderLines").unwrap().column("OrderId").unwrap();
    assert!(order_id.is_foreign_key);
    assert!(order_id.is_primary_key);
    assert_eq!(order_id.parent_relationships[0].table_or_view, "Orders");
    assert_eq!(order_id.parent_relationships[0].columns, vec!["Id"]);
}

#[test]
fn test_views_expose_resolved_columns() {
    let ctx = TestContext::with_fixture("sales_db");
    let model = ctx.generate_successfully().model;

    let all = model.view("dbo", "AllCustomers").unwrap();
    let names: Vec<&str> = all.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Id", "Name", "Email", "Phone"]);

    let totals = model.view("dbo", "CustomerOrderTotals").unwrap();
    assert_eq!(totals.columns[0].name, "CustomerId");
    assert_eq!(totals.columns[2].data_type.source_name, "decimal");
}

// ============================================================================
// Procedures and plans
// ============================================================================

#[test]
fn test_top_one_select_is_single_dto() {
    let ctx = TestContext::with_fixture("sales_db");
    let generated = ctx.generate_successfully();

    let get = plan(&generated.plans, "GetCustomer");
    assert_eq!(get.raw_name, "usp_GetCustomer");
    assert_eq!(
        get.shape,
        ReturnShape::SingleDto {
            dto: "GetCustomerOutputDto".to_string()
        }
    );
    let dto = &get.output_dtos[0];
    let types: Vec<(&str, &str)> = dto
        .properties
        .iter()
        .map(|p| (p.name.as_str(), p.host_type.as_str()))
        .collect();
    assert_eq!(
        types,
        vec![
            ("Id", "Int32"),
            ("Name", "String"),
            ("Email", "String"),
            ("Phone", "String"),
        ]
    );
}

#[test]
fn test_left_join_columns_become_nullable() {
    let ctx = TestContext::with_fixture("sales_db");
    let generated = ctx.generate_successfully();

    let select = &procedure(&generated.model, "ListCustomerOrders").selects[0];
    assert!(!select.is_single_row);
    let nullable: Vec<bool> = select.columns.iter().map(|c| c.is_nullable).collect();
    assert_eq!(nullable, vec![false, true, true]);
    assert_eq!(select.table_aliases.get("o").map(String::as_str), Some("dbo.Orders"));

    let list = plan(&generated.plans, "ListCustomerOrders");
    assert!(matches!(list.shape, ReturnShape::DtoSequence { .. }));
    assert_eq!(list.output_dtos[0].properties[1].host_type, "Int32?");
    assert_eq!(list.output_dtos[0].properties[2].host_type, "Decimal?");
}

#[test]
fn test_scope_identity_is_scalar_value_with_output_parameter() {
    let ctx = TestContext::with_fixture("sales_db");
    let generated = ctx.generate_successfully();

    let add = plan(&generated.plans, "AddCustomer");
    assert_eq!(add.shape.name(), "scalar_value");
    assert!(matches!(add.execution, ExecutionPlan::Scalar { .. }));
    assert_eq!(add.output_assignments.len(), 1);
    assert_eq!(add.output_assignments[0].name, "NewId");

    let new_id = add.bindings.iter().find(|b| b.name == "NewId").unwrap();
    assert!(matches!(new_id.binding, ParameterBinding::Output { .. }));

    // Alias-typed parameter binds with its base type's tag
    let email = add.bindings.iter().find(|b| b.name == "Email").unwrap();
    assert_eq!(
        email.binding,
        ParameterBinding::Input { tag: "NVarChar" }
    );
}

#[test]
fn test_table_valued_parameter_plan() {
    let ctx = TestContext::with_fixture("sales_db");
    let generated = ctx.generate_successfully();

    let add_lines = plan(&generated.plans, "AddOrderLines");
    assert_eq!(add_lines.shape, ReturnShape::AffectedRowCount);
    assert!(matches!(add_lines.execution, ExecutionPlan::NonQuery));
    assert_eq!(add_lines.table_values.len(), 1);

    let lines = &add_lines.table_values[0];
    assert_eq!(lines.parameter, "Lines");
    assert_eq!(lines.row_dto.name, "AddOrderLines_LinesParamDto");
    let ordinals: Vec<usize> = lines.fields.iter().map(|f| f.ordinal).collect();
    assert_eq!(ordinals, vec![0, 1, 2]);
}

#[test]
fn test_union_collapses_to_one_scalar_sequence() {
    let ctx = TestContext::with_fixture("sales_db");
    let generated = ctx.generate_successfully();

    let names = procedure(&generated.model, "CustomerNames");
    assert_eq!(names.selects.len(), 1);
    assert_eq!(
        names.selects[0].columns[0].provenance,
        Provenance::Column {
            source: "dbo.Customers".to_string(),
            column: "Name".to_string(),
        }
    );
    assert_eq!(
        plan(&generated.plans, "CustomerNames").shape,
        ReturnShape::ScalarSequence {
            host_type: "String".to_string()
        }
    );
}

#[test]
fn test_two_selects_make_a_result_bundle() {
    let ctx = TestContext::with_fixture("sales_db");
    let generated = ctx.generate_successfully();

    let dashboard = plan(&generated.plans, "Dashboard");
    assert_eq!(
        dashboard.shape,
        ReturnShape::ResultBundle {
            bundle: "DashboardResults".to_string(),
            dtos: vec![
                "DashboardOutputDto".to_string(),
                "DashboardOutputDto2".to_string()
            ],
        }
    );
    let ExecutionPlan::Reader { result_sets } = &dashboard.execution else {
        panic!("bundle should read with a reader");
    };
    assert_eq!(result_sets.len(), 2);
    assert!(result_sets[0].advance_after);
    assert!(!result_sets[1].advance_after);
}

#[test]
fn test_procedure_without_selects_returns_row_count() {
    let ctx = TestContext::with_fixture("sales_db");
    let generated = ctx.generate_successfully();

    let delete = plan(&generated.plans, "DeleteOrder");
    assert_eq!(delete.shape, ReturnShape::AffectedRowCount);
    assert_eq!(delete.method_parameters.len(), 1);
    assert_eq!(delete.method_parameters[0].host_type, "Int32?");
}

// ============================================================================
// Inputs and failures
// ============================================================================

#[test]
fn test_directory_input_matches_project_input() {
    let ctx = TestContext::with_fixture("sales_db");
    let from_project = ctx.generate_successfully();
    let from_directory = generate(&ctx.directory_options()).unwrap();

    assert_eq!(from_project.model.tables.len(), from_directory.model.tables.len());
    assert_eq!(from_project.plans.len(), from_directory.plans.len());
}

#[test]
fn test_failed_procedure_is_reported_and_skipped() {
    let ctx = TestContext::empty();
    ctx.write_sql("t.sql", "CREATE TABLE t (a INT NOT NULL)\nGO\n");
    ctx.write_sql("good.sql", "CREATE PROCEDURE usp_Good AS SELECT a FROM t\nGO\n");
    ctx.write_sql("bad.sql", "CREATE PROCEDURE usp_Bad AS SELECT b FROM t\nGO\n");

    let generated = generate(&ctx.directory_options()).unwrap();
    assert_eq!(generated.plans.len(), 1);
    assert_eq!(generated.plans[0].procedure, "Good");
    assert_eq!(generated.failures.len(), 1);
    assert!(generated.failures[0].to_string().contains("usp_Bad"));
}

#[test]
fn test_unknown_column_type_aborts_generation() {
    let ctx = TestContext::empty();
    ctx.write_sql("t.sql", "CREATE TABLE t (shape GEOMETRY)\nGO\n");

    let error = generate(&ctx.directory_options()).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<SqlSharpenError>(),
        Some(SqlSharpenError::UnknownColumnType { .. })
    ));
}

#[test]
fn test_missing_sql_path_is_an_error() {
    let options = GenerateOptions {
        sql_paths: vec!["/no/such/dir".into()],
        ..GenerateOptions::default()
    };
    let error = generate(&options).unwrap_err();
    assert!(matches!(
        error.downcast_ref::<SqlSharpenError>(),
        Some(SqlSharpenError::SqlPathNotFound { .. })
    ));
}

#[test]
fn test_default_schema_override() {
    let ctx = TestContext::empty();
    ctx.write_sql("t.sql", "CREATE TABLE t (a INT)\nGO\n");
    let options = GenerateOptions {
        default_schema: Some("sales".to_string()),
        ..ctx.directory_options()
    };

    let generated = generate(&options).unwrap();
    assert_eq!(generated.model.tables[0].schema, "sales");
}
