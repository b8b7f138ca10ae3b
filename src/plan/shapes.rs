//! Code plan records consumed by the template stage

use serde::Serialize;

/// Return shape of a procedure's generated method
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ReturnShape {
    /// No selects: the method returns the affected row count
    AffectedRowCount,
    /// One select, one column, one row
    ScalarValue { host_type: String },
    /// One select, one column, many rows
    ScalarSequence { host_type: String },
    /// One select, several columns, one row
    SingleDto { dto: String },
    /// One select, several columns, many rows
    DtoSequence { dto: String },
    /// Several selects, collected into one bundle object
    ResultBundle { bundle: String, dtos: Vec<String> },
}

impl ReturnShape {
    pub fn name(&self) -> &'static str {
        match self {
            ReturnShape::AffectedRowCount => "affected_row_count",
            ReturnShape::ScalarValue { .. } => "scalar_value",
            ReturnShape::ScalarSequence { .. } => "scalar_sequence",
            ReturnShape::SingleDto { .. } => "single_dto",
            ReturnShape::DtoSequence { .. } => "dto_sequence",
            ReturnShape::ResultBundle { .. } => "result_bundle",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DtoProperty {
    pub name: String,
    pub host_type: String,
    /// Output parameters are filled by the generated method, not the caller
    pub internal_setter: bool,
}

impl DtoProperty {
    pub fn new(name: impl Into<String>, host_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host_type: host_type.into(),
            internal_setter: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DtoType {
    pub name: String,
    pub properties: Vec<DtoProperty>,
}

/// How a table-valued parameter field is written to its record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NullPolicy {
    /// Write the value, or DBNull when it has none
    CheckHasValue,
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordField {
    pub name: String,
    pub ordinal: usize,
    pub binding_tag: &'static str,
    pub setter: String,
    pub null_policy: NullPolicy,
}

/// Companion row DTO and serialization plan for one table-valued parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableValuePlan {
    pub parameter: String,
    pub row_dto: DtoType,
    pub fields: Vec<RecordField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodParameter {
    pub name: String,
    pub host_type: String,
    pub is_output: bool,
    pub is_table_value: bool,
}

/// Spellings of a procedure's parameter list in generated code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterListStyle {
    /// `Int32? id, out String name, IEnumerable<P_rowsParamDto> rows`
    Declaration,
    /// Declaration with table values as `IEnumerable<ITableValuedParamRow>`
    GenericDeclaration,
    /// `(Int32?)id, out (String)name, (IEnumerable<P_rowsParamDto>)rows`
    Cast,
    GenericCast,
    /// `id, out name, rows`
    Names,
    /// Call forwarded from an input DTO: `input.id, out nameOutput`
    InputDto,
    /// Call forwarded from `object[] parameters`; output parameters take no slot
    ObjectArray,
}

/// Every rendered parameter list of one procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterLists {
    pub declaration: String,
    pub generic_declaration: String,
    pub cast: String,
    pub generic_cast: String,
    pub names: String,
    pub input_dto: String,
    pub object_array: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "direction", rename_all = "snake_case")]
pub enum ParameterBinding {
    /// Bound by value, with DBNull when the value is null
    Input { tag: &'static str },
    Output { tag: &'static str },
    /// Rows streamed from the table-valued parameter's row DTOs
    Structured { row_dto: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlParameterBinding {
    pub name: String,
    #[serde(flatten)]
    pub binding: ParameterBinding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReadMethod {
    /// Binary values go through the byte-buffer helper
    Bytes,
    Accessor { name: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRead {
    pub ordinal: usize,
    /// DTO property; `None` when the item is the value itself
    pub property: Option<String>,
    pub method: ReadMethod,
    /// Check for DBNull before reading
    pub null_check: bool,
    /// Type whose default is used for a null value
    pub default_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSetPlan {
    pub item_type: String,
    /// Rows are collected into a list rather than assigned directly
    pub collect_list: bool,
    /// Bundle property receiving the list (multi-select only)
    pub bundle_property: Option<String>,
    /// Move to the next result set after this one
    pub advance_after: bool,
    pub reads: Vec<ColumnRead>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionPlan {
    NonQuery,
    Scalar { cast_type: String },
    Reader { result_sets: Vec<ResultSetPlan> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputAssignment {
    pub name: String,
    pub host_type: String,
}

/// Everything the template stage needs to emit one procedure's data access code
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodePlan {
    pub procedure: String,
    pub raw_name: String,
    #[serde(flatten)]
    pub shape: ReturnShape,
    pub input_dto: Option<DtoType>,
    pub table_values: Vec<TableValuePlan>,
    pub output_dtos: Vec<DtoType>,
    pub bundle: Option<DtoType>,
    pub return_type: String,
    pub return_variable: String,
    pub return_description: String,
    pub method_parameters: Vec<MethodParameter>,
    pub parameter_lists: ParameterLists,
    pub bindings: Vec<SqlParameterBinding>,
    pub execution: ExecutionPlan,
    pub output_assignments: Vec<OutputAssignment>,
}
