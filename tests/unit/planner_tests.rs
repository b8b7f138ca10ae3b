//! Unit tests for the shape classifier and code planner

use sql_sharpen::load_model_from_sql;
use sql_sharpen::model::SchemaModel;
use sql_sharpen::plan::{
    classify, plan_procedure, plan_procedures, render_method_parameters, render_parameter_list,
    NullPolicy, ParameterBinding, ParameterListStyle, ReadMethod, ReturnShape,
};

const SCHEMA: &str = "create table tb1 (id int primary key, col1 int not null, photo varbinary(max) null)
go
create type tbInput as table (id int not null, amount decimal(10, 2) null, label nvarchar(20) null)
go
";

fn model_with(procedure: &str) -> SchemaModel {
    let built = load_model_from_sql(&[SCHEMA, procedure], "usp_").unwrap();
    assert!(built.failures.is_empty(), "{:?}", built.failures);
    built.model
}

fn shape_of(procedure: &str) -> ReturnShape {
    let model = model_with(procedure);
    classify(&model.procedures[0])
}

// ============================================================================
// Shapes
// ============================================================================

#[test]
fn test_every_shape() {
    assert_eq!(
        shape_of("create procedure usp_A as delete from tb1"),
        ReturnShape::AffectedRowCount
    );
    assert_eq!(
        shape_of("create procedure usp_B as select top 1 col1 from tb1"),
        ReturnShape::ScalarValue {
            host_type: "Int32".to_string()
        }
    );
    assert_eq!(
        shape_of("create procedure usp_C as select col1 from tb1"),
        ReturnShape::ScalarSequence {
            host_type: "Int32".to_string()
        }
    );
    assert_eq!(
        shape_of("create procedure usp_D as select top 1 id, col1 from tb1"),
        ReturnShape::SingleDto {
            dto: "DOutputDto".to_string()
        }
    );
    assert_eq!(
        shape_of("create procedure usp_E as select id, col1 from tb1"),
        ReturnShape::DtoSequence {
            dto: "EOutputDto".to_string()
        }
    );
    assert!(matches!(
        shape_of("create procedure usp_F as select id from tb1 select col1 from tb1"),
        ReturnShape::ResultBundle { .. }
    ));
}

#[test]
fn test_dropping_top_one_changes_only_cardinality() {
    let single = shape_of("create procedure usp_P as select top 1 col1 from tb1");
    let many = shape_of("create procedure usp_P as select col1 from tb1");

    let (ReturnShape::ScalarValue { host_type: a }, ReturnShape::ScalarSequence { host_type: b }) =
        (&single, &many)
    else {
        panic!("unexpected shapes {:?} / {:?}", single, many);
    };
    assert_eq!(a, b);
}

#[test]
fn test_bundle_has_one_dto_and_property_per_select() {
    let model = model_with(
        "create procedure usp_Many as
            select id from tb1
            select top 1 col1 from tb1
            select id, col1 from tb1",
    );
    let plan = plan_procedure(&model.procedures[0]);

    let names: Vec<&str> = plan.output_dtos.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["ManyOutputDto", "ManyOutputDto2", "ManyOutputDto3"]);

    let bundle = plan.bundle.as_ref().unwrap();
    assert_eq!(bundle.name, "ManyResults");
    let sequences: Vec<&str> = bundle
        .properties
        .iter()
        .filter(|p| p.host_type.starts_with("IEnumerable<"))
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(sequences, vec!["Result", "Result2", "Result3"]);
    assert_eq!(plan.return_type, "ManyResults");
}

// ============================================================================
// Parameters
// ============================================================================

#[test]
fn test_table_value_serialization_plan() {
    let model = model_with("create procedure usp_Save @rows tbInput readonly, @note nvarchar(10) as select 1");
    let plan = plan_procedure(&model.procedures[0]);

    let rows = &plan.table_values[0];
    assert_eq!(rows.row_dto.name, "Save_rowsParamDto");
    let policies: Vec<(&str, &str, NullPolicy)> = rows
        .fields
        .iter()
        .map(|f| (f.name.as_str(), f.binding_tag, f.null_policy))
        .collect();
    assert_eq!(
        policies,
        vec![
            ("id", "Int", NullPolicy::Direct),
            ("amount", "Decimal", NullPolicy::CheckHasValue),
            ("label", "NVarChar", NullPolicy::Direct),
        ]
    );
    assert_eq!(rows.fields[1].setter, "SetDecimal");

    assert_eq!(
        plan.bindings[0].binding,
        ParameterBinding::Structured {
            row_dto: "Save_rowsParamDto".to_string()
        }
    );
    assert_eq!(
        render_method_parameters(&plan.method_parameters),
        "IEnumerable<Save_rowsParamDto> rows, String note"
    );
}

#[test]
fn test_output_parameters() {
    let model = model_with("create procedure usp_Count @total int output as select @total = count(*) from tb1");
    let plan = plan_procedure(&model.procedures[0]);

    assert_eq!(plan.shape, ReturnShape::AffectedRowCount);
    assert_eq!(render_method_parameters(&plan.method_parameters), "out Int32? total");
    assert_eq!(plan.output_assignments[0].host_type, "Int32?");

    let input = plan.input_dto.as_ref().unwrap();
    assert_eq!(input.name, "CountInputDto");
    assert!(input.properties[0].internal_setter);
}

#[test]
fn test_parameter_list_styles() {
    let model = model_with(
        "create procedure usp_Mixed @id int, @rows tbInput readonly, @total int output, @note nvarchar(10)
         as select 1",
    );
    let plan = plan_procedure(&model.procedures[0]);
    let lists = &plan.parameter_lists;

    assert_eq!(
        lists.declaration,
        "Int32? id, IEnumerable<Mixed_rowsParamDto> rows, out Int32? total, String note"
    );
    assert_eq!(
        lists.generic_declaration,
        "Int32? id, IEnumerable<ITableValuedParamRow> rows, out Int32? total, String note"
    );
    assert_eq!(
        lists.cast,
        "(Int32?)id, (IEnumerable<Mixed_rowsParamDto>)rows, out (Int32?)total, (String)note"
    );
    assert_eq!(
        lists.generic_cast,
        "(Int32?)id, (IEnumerable<ITableValuedParamRow>)rows, out (Int32?)total, (String)note"
    );
    assert_eq!(lists.names, "id, rows, out total, note");
    assert_eq!(lists.input_dto, "input.id, input.rows, out totalOutput, input.note");
    assert_eq!(
        lists.object_array,
        "(Int32?)parameters[0], (IEnumerable<ITableValuedParamRow>)parameters[1], out totalOutput, (String)parameters[2]"
    );
    assert_eq!(
        render_parameter_list(&plan.method_parameters, ParameterListStyle::Declaration),
        render_method_parameters(&plan.method_parameters)
    );
}

#[test]
fn test_parameter_lists_are_empty_without_parameters() {
    let model = model_with("create procedure usp_None as select 1");
    let lists = &plan_procedure(&model.procedures[0]).parameter_lists;
    assert_eq!(lists.names, "");
    assert_eq!(lists.object_array, "");
}

// ============================================================================
// Reads
// ============================================================================

#[test]
fn test_column_reads() {
    let model = model_with("create procedure usp_Read as select id, photo, col1 from tb1");
    let plan = plan_procedure(&model.procedures[0]);

    let sql_sharpen::plan::ExecutionPlan::Reader { result_sets } = &plan.execution else {
        panic!("expected a reader");
    };
    let reads = &result_sets[0].reads;
    assert_eq!(
        reads[0].method,
        ReadMethod::Accessor { name: "GetInt32" }
    );
    assert!(!reads[0].null_check);
    assert_eq!(reads[1].method, ReadMethod::Bytes);
    assert_eq!(reads[2].property.as_deref(), Some("col1"));
    assert!(result_sets[0].collect_list);
}

#[test]
fn test_plans_follow_procedure_order() {
    let sources: Vec<String> = (0..10)
        .map(|i| format!("create procedure usp_P{} as select col1 from tb1", i))
        .collect();
    let mut all: Vec<&str> = vec![SCHEMA];
    all.extend(sources.iter().map(String::as_str));

    let model = load_model_from_sql(&all, "usp_").unwrap().model;
    let plans = plan_procedures(&model.procedures);
    let names: Vec<&str> = plans.iter().map(|p| p.procedure.as_str()).collect();
    let expected: Vec<String> = (0..10).map(|i| format!("P{}", i)).collect();
    assert_eq!(names, expected);
}
