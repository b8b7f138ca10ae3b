//! Shape classifier and code planner
//!
//! A pure function of a resolved [`Procedure`]. Every procedure gets exactly
//! one [`ReturnShape`]:
//!
//! ```text
//! selects  columns  rows   shape
//! 0        -        -      affected row count
//! 1        1        1      scalar value
//! 1        1        many   scalar sequence
//! 1        many     1      single DTO
//! 1        many     many   DTO sequence
//! many     -        -      result bundle
//! ```

use rayon::prelude::*;

use super::shapes::{
    CodePlan, ColumnRead, DtoProperty, DtoType, ExecutionPlan, MethodParameter, NullPolicy,
    OutputAssignment, ParameterBinding, ParameterListStyle, ParameterLists, ReadMethod,
    RecordField, ResultSetPlan, ReturnShape, SqlParameterBinding, TableValuePlan,
};
use crate::model::{Column, Parameter, ParameterKind, Procedure, Select, SelectColumn};

/// Minimum number of procedures to benefit from parallel planning
const PARALLEL_THRESHOLD: usize = 8;

/// Row sequence type shared by every table-valued parameter
const GENERIC_ROW_SEQUENCE: &str = "IEnumerable<ITableValuedParamRow>";

/// Host type of a select column, stripped when it cannot be null
fn column_host_type(column: &SelectColumn) -> &'static str {
    column.data_type.host_type(column.is_nullable)
}

/// `""`, `"2"`, `"3"`, ... for the select at `index`
fn ordinal_suffix(index: usize) -> String {
    if index == 0 {
        String::new()
    } else {
        (index + 1).to_string()
    }
}

fn output_dto_name(procedure: &Procedure, index: usize) -> String {
    format!("{}OutputDto{}", procedure.name, ordinal_suffix(index))
}

fn table_value_dto_name(procedure: &Procedure, parameter: &Parameter) -> String {
    format!("{}_{}ParamDto", procedure.name, parameter.name)
}

/// Classify a procedure by select count, column count and row cardinality.
pub fn classify(procedure: &Procedure) -> ReturnShape {
    match procedure.selects.as_slice() {
        [] => ReturnShape::AffectedRowCount,
        [select] => match (select.columns.as_slice(), select.is_single_row) {
            ([column], true) => ReturnShape::ScalarValue {
                host_type: column_host_type(column).to_string(),
            },
            ([column], false) => ReturnShape::ScalarSequence {
                host_type: column_host_type(column).to_string(),
            },
            (_, true) => ReturnShape::SingleDto {
                dto: output_dto_name(procedure, 0),
            },
            (_, false) => ReturnShape::DtoSequence {
                dto: output_dto_name(procedure, 0),
            },
        },
        selects => ReturnShape::ResultBundle {
            bundle: format!("{}Results", procedure.name),
            dtos: (0..selects.len())
                .map(|i| output_dto_name(procedure, i))
                .collect(),
        },
    }
}

/// Plan every procedure; order follows the input.
pub fn plan_procedures(procedures: &[Procedure]) -> Vec<CodePlan> {
    if procedures.len() >= PARALLEL_THRESHOLD {
        procedures.par_iter().map(plan_procedure).collect()
    } else {
        procedures.iter().map(plan_procedure).collect()
    }
}

/// Build the full code plan for one procedure.
pub fn plan_procedure(procedure: &Procedure) -> CodePlan {
    let shape = classify(procedure);
    let return_type = return_type(&shape);
    let method_parameters = method_parameters(procedure);

    CodePlan {
        procedure: procedure.name.clone(),
        raw_name: procedure.raw_name.clone(),
        input_dto: input_dto(procedure),
        table_values: procedure
            .parameters
            .iter()
            .filter_map(|p| table_value_plan(procedure, p))
            .collect(),
        output_dtos: output_dtos(procedure, &shape),
        bundle: bundle_dto(&shape),
        return_variable: return_variable(&shape, &return_type),
        return_description: return_description(procedure, &shape),
        return_type,
        parameter_lists: parameter_lists(&method_parameters),
        method_parameters,
        bindings: bindings(procedure),
        execution: execution_plan(procedure, &shape),
        output_assignments: procedure
            .parameters
            .iter()
            .filter(|p| p.is_output)
            .map(|p| OutputAssignment {
                name: p.name.clone(),
                host_type: parameter_host_type(procedure, p),
            })
            .collect(),
        shape,
    }
}

/// Nullable host type of a scalar parameter, or the row sequence of a table-valued one
fn parameter_host_type(procedure: &Procedure, parameter: &Parameter) -> String {
    match &parameter.kind {
        ParameterKind::Scalar { data_type } => data_type.host_nullable.to_string(),
        ParameterKind::TableValue { .. } => {
            format!("IEnumerable<{}>", table_value_dto_name(procedure, parameter))
        }
    }
}

fn input_dto(procedure: &Procedure) -> Option<DtoType> {
    if procedure.parameters.is_empty() {
        return None;
    }
    Some(DtoType {
        name: format!("{}InputDto", procedure.name),
        properties: procedure
            .parameters
            .iter()
            .map(|p| DtoProperty {
                name: p.name.clone(),
                host_type: parameter_host_type(procedure, p),
                internal_setter: p.is_output,
            })
            .collect(),
    })
}

fn record_field(ordinal: usize, column: &Column) -> RecordField {
    let null_policy = if column.is_nullable && column.data_type.is_nullable_value_type() {
        NullPolicy::CheckHasValue
    } else {
        NullPolicy::Direct
    };
    RecordField {
        name: column.name.clone(),
        ordinal,
        binding_tag: column.data_type.binding_tag,
        setter: column.data_type.record_setter(),
        null_policy,
    }
}

fn table_value_plan(procedure: &Procedure, parameter: &Parameter) -> Option<TableValuePlan> {
    let shape = parameter.table_value()?;
    Some(TableValuePlan {
        parameter: parameter.name.clone(),
        row_dto: DtoType {
            name: table_value_dto_name(procedure, parameter),
            properties: shape
                .columns
                .iter()
                .map(|c| DtoProperty::new(c.name.clone(), c.data_type.host_type(c.is_nullable)))
                .collect(),
        },
        fields: shape
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| record_field(i, c))
            .collect(),
    })
}

fn select_dto(name: String, select: &Select) -> DtoType {
    DtoType {
        name,
        properties: select
            .columns
            .iter()
            .map(|c| DtoProperty::new(c.name.clone(), column_host_type(c)))
            .collect(),
    }
}

/// Row DTOs exist only for the DTO and bundle shapes.
fn output_dtos(procedure: &Procedure, shape: &ReturnShape) -> Vec<DtoType> {
    match shape {
        ReturnShape::AffectedRowCount
        | ReturnShape::ScalarValue { .. }
        | ReturnShape::ScalarSequence { .. } => Vec::new(),
        ReturnShape::SingleDto { .. }
        | ReturnShape::DtoSequence { .. }
        | ReturnShape::ResultBundle { .. } => procedure
            .selects
            .iter()
            .enumerate()
            .map(|(i, select)| select_dto(output_dto_name(procedure, i), select))
            .collect(),
    }
}

fn bundle_dto(shape: &ReturnShape) -> Option<DtoType> {
    let ReturnShape::ResultBundle { bundle, dtos } = shape else {
        return None;
    };
    let mut properties = vec![DtoProperty::new("RecordsAffected", "int")];
    properties.extend(dtos.iter().enumerate().map(|(i, dto)| {
        DtoProperty::new(format!("Result{}", ordinal_suffix(i)), format!("IEnumerable<{}>", dto))
    }));
    Some(DtoType {
        name: bundle.clone(),
        properties,
    })
}

fn return_type(shape: &ReturnShape) -> String {
    match shape {
        ReturnShape::AffectedRowCount => "int".to_string(),
        ReturnShape::ScalarValue { host_type } => host_type.clone(),
        ReturnShape::ScalarSequence { host_type } => format!("Result<IEnumerable<{}>>", host_type),
        ReturnShape::SingleDto { dto } => format!("Result<{}>", dto),
        ReturnShape::DtoSequence { dto } => format!("Result<IEnumerable<{}>>", dto),
        ReturnShape::ResultBundle { bundle, .. } => bundle.clone(),
    }
}

fn return_variable(shape: &ReturnShape, return_type: &str) -> String {
    match shape {
        ReturnShape::AffectedRowCount => format!("{} result;", return_type),
        ReturnShape::ScalarValue { .. } => {
            format!("{0} result = default({0});", return_type)
        }
        _ => format!("{0} result = new {0}();", return_type),
    }
}

fn return_description(procedure: &Procedure, shape: &ReturnShape) -> String {
    let first_column = || {
        procedure
            .selects
            .first()
            .and_then(|s| s.columns.first())
            .map(|c| c.name.as_str())
            .unwrap_or_default()
    };
    match shape {
        ReturnShape::AffectedRowCount => "The number of rows affected.".to_string(),
        ReturnShape::ScalarValue { .. } => format!("The value of {}", first_column()),
        ReturnShape::ScalarSequence { .. } => format!("An IEnumerable of {}", first_column()),
        ReturnShape::SingleDto { .. } => {
            "A DTO filled with the results of the SELECT statement.".to_string()
        }
        ReturnShape::DtoSequence { .. } => {
            "An IEnumerable of DTOs filled with the results of the SELECT statement.".to_string()
        }
        ReturnShape::ResultBundle { .. } => "An object containing all the SELECT results in \
             properties named 'Result', 'Result2', 'Result3', etc."
            .to_string(),
    }
}

fn method_parameters(procedure: &Procedure) -> Vec<MethodParameter> {
    procedure
        .parameters
        .iter()
        .map(|p| MethodParameter {
            name: p.name.clone(),
            host_type: parameter_host_type(procedure, p),
            is_output: p.is_output,
            is_table_value: p.table_value().is_some(),
        })
        .collect()
}

/// Render the declaration list: `Int32? id, out String name, IEnumerable<P_RowsParamDto> rows`
pub fn render_method_parameters(parameters: &[MethodParameter]) -> String {
    render_parameter_list(parameters, ParameterListStyle::Declaration)
}

/// Render a parameter list in one style.
pub fn render_parameter_list(parameters: &[MethodParameter], style: ParameterListStyle) -> String {
    let mut slot = 0;
    parameters
        .iter()
        .map(|p| {
            let out = if p.is_output && !p.is_table_value {
                "out "
            } else {
                ""
            };
            let host_type = match style {
                ParameterListStyle::GenericDeclaration | ParameterListStyle::GenericCast
                    if p.is_table_value =>
                {
                    GENERIC_ROW_SEQUENCE
                }
                _ => p.host_type.as_str(),
            };

            match style {
                ParameterListStyle::Declaration | ParameterListStyle::GenericDeclaration => {
                    format!("{}{} {}", out, host_type, p.name)
                }
                ParameterListStyle::Cast | ParameterListStyle::GenericCast => {
                    format!("{}({}){}", out, host_type, p.name)
                }
                ParameterListStyle::Names => format!("{}{}", out, p.name),
                ParameterListStyle::InputDto if p.is_output => format!("out {}Output", p.name),
                ParameterListStyle::InputDto => format!("input.{}", p.name),
                ParameterListStyle::ObjectArray if p.is_output => format!("out {}Output", p.name),
                ParameterListStyle::ObjectArray => {
                    let cast = if p.is_table_value {
                        GENERIC_ROW_SEQUENCE
                    } else {
                        p.host_type.as_str()
                    };
                    slot += 1;
                    format!("({})parameters[{}]", cast, slot - 1)
                }
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn parameter_lists(parameters: &[MethodParameter]) -> ParameterLists {
    let render = |style| render_parameter_list(parameters, style);
    ParameterLists {
        declaration: render(ParameterListStyle::Declaration),
        generic_declaration: render(ParameterListStyle::GenericDeclaration),
        cast: render(ParameterListStyle::Cast),
        generic_cast: render(ParameterListStyle::GenericCast),
        names: render(ParameterListStyle::Names),
        input_dto: render(ParameterListStyle::InputDto),
        object_array: render(ParameterListStyle::ObjectArray),
    }
}

fn bindings(procedure: &Procedure) -> Vec<SqlParameterBinding> {
    procedure
        .parameters
        .iter()
        .map(|p| {
            let binding = match &p.kind {
                ParameterKind::TableValue { .. } => ParameterBinding::Structured {
                    row_dto: table_value_dto_name(procedure, p),
                },
                ParameterKind::Scalar { data_type } if p.is_output => ParameterBinding::Output {
                    tag: data_type.binding_tag,
                },
                ParameterKind::Scalar { data_type } => ParameterBinding::Input {
                    tag: data_type.binding_tag,
                },
            };
            SqlParameterBinding {
                name: p.name.clone(),
                binding,
            }
        })
        .collect()
}

fn column_read(ordinal: usize, column: &SelectColumn, single_column: bool) -> ColumnRead {
    let data_type = column.data_type;
    let binary = data_type.is_binary();
    ColumnRead {
        ordinal,
        property: (!single_column).then(|| column.name.clone()),
        method: if binary {
            ReadMethod::Bytes
        } else {
            ReadMethod::Accessor {
                name: data_type.reader_accessor.unwrap_or("GetValue"),
            }
        },
        null_check: column.is_nullable && !binary,
        default_type: data_type.host_nullable.to_string(),
    }
}

fn execution_plan(procedure: &Procedure, shape: &ReturnShape) -> ExecutionPlan {
    match shape {
        ReturnShape::AffectedRowCount => ExecutionPlan::NonQuery,
        ReturnShape::ScalarValue { host_type } => ExecutionPlan::Scalar {
            cast_type: host_type.clone(),
        },
        ReturnShape::ScalarSequence { .. }
        | ReturnShape::SingleDto { .. }
        | ReturnShape::DtoSequence { .. }
        | ReturnShape::ResultBundle { .. } => {
            let multi = procedure.selects.len() > 1;
            let count = procedure.selects.len();
            let result_sets = procedure
                .selects
                .iter()
                .enumerate()
                .map(|(i, select)| {
                    let single_column = !multi && select.columns.len() == 1;
                    let item_type = match select.columns.as_slice() {
                        [column] if single_column => column_host_type(column).to_string(),
                        _ => output_dto_name(procedure, i),
                    };
                    ResultSetPlan {
                        item_type,
                        collect_list: multi || !select.is_single_row,
                        bundle_property: multi.then(|| format!("Result{}", ordinal_suffix(i))),
                        advance_after: multi && i + 1 < count,
                        reads: select
                            .columns
                            .iter()
                            .enumerate()
                            .map(|(j, c)| column_read(j, c, single_column))
                            .collect(),
                    }
                })
                .collect();
            ExecutionPlan::Reader { result_sets }
        }
    }
}
