use reportkit_io_tabular::cache::CacheReader;
use reportkit_io_tabular::conf::{
    derive_default_csv_write_options, derive_default_tabular_formats,
    derive_default_xlsx_write_options,
};
use reportkit_io_tabular::export::{
    collect_headers_from_cache, export_cache_to_csv, export_cache_to_xlsx,
};
use reportkit_io_tabular::report::ReportExport;
use reportkit_io_tabular::spec::{
    EnumHeader, EnumHeaderRenderMode, SpecAutofitCellsPolicy, SpecCellFormat,
    SpecCsvWriteOptions, SpecRecord, SpecXlsxWriteOptions, TabularWriteError,
};
use reportkit_io_tabular::writer::{TabularWriter, XlsxWriter as RsXlsxWriter};
use pyo3::exceptions::{PyOSError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyAny, PyDict, PyList, PyString};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "reportkit.tabular.writer.v1";

#[pyclass(name = "XlsxWriter")]
struct PyXlsxWriter {
    #[pyo3(get)]
    file_out: String,
    inner: RsXlsxWriter,
}

#[pymethods]
impl PyXlsxWriter {
    #[new]
    #[pyo3(signature = (file_out, write_options = None))]
    fn new(file_out: String, write_options: Option<&Bound<'_, PyAny>>) -> PyResult<Self> {
        let cfg_write_options = parse_spec_xlsx_write_options(write_options)?
            .unwrap_or_else(derive_default_xlsx_write_options);
        let inner = RsXlsxWriter::new(&file_out, cfg_write_options).map_err(map_tabular_error)?;
        Ok(Self { file_out, inner })
    }

    fn __enter__(slf: PyRefMut<'_, Self>) -> PyRefMut<'_, Self> {
        slf
    }

    #[pyo3(signature = (_exc_type=None, _exc=None, _tb=None))]
    fn __exit__(
        &mut self,
        _exc_type: Option<&Bound<'_, PyAny>>,
        _exc: Option<&Bound<'_, PyAny>>,
        _tb: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<()> {
        self.close()
    }

    fn close(&mut self) -> PyResult<()> {
        self.inner.finalize().map_err(map_tabular_error)
    }

    #[pyo3(signature = (creator = "", title = ""))]
    fn set_properties(&mut self, creator: &str, title: &str) -> PyResult<()> {
        self.inner
            .set_properties(creator, title)
            .map_err(map_tabular_error)
    }

    #[pyo3(signature = (index = None, title = None))]
    fn set_worksheet(&mut self, index: Option<usize>, title: Option<&str>) -> PyResult<()> {
        self.inner
            .set_worksheet(index, title)
            .map_err(map_tabular_error)
    }

    fn select_worksheet(&mut self, index: usize) -> PyResult<()> {
        self.inner.select_worksheet(index).map_err(map_tabular_error)
    }

    fn set_sheet_title(&mut self, title: &str) -> PyResult<()> {
        self.inner.set_sheet_title(title).map_err(map_tabular_error)
    }

    #[pyo3(signature = (headers, init_row = None))]
    fn write_headers(&mut self, headers: &Bound<'_, PyAny>, init_row: Option<u32>) -> PyResult<()> {
        let l_headers = parse_headers(headers)?;
        match init_row {
            Some(n_row_init) => self.inner.insert_headers_before(&l_headers, n_row_init),
            None => self.inner.write_headers(&l_headers),
        }
        .map_err(map_tabular_error)
    }

    #[pyo3(signature = (row, headers = None))]
    fn write_row(
        &mut self,
        py: Python<'_>,
        row: &Bound<'_, PyAny>,
        headers: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<u64> {
        let l_headers = parse_optional_headers(headers)?;
        let record = parse_record(py, row)?;
        self.inner
            .write_row(&record, &l_headers)
            .map_err(map_tabular_error)
    }

    #[pyo3(signature = (rows, headers = None))]
    fn write_rows(
        &mut self,
        py: Python<'_>,
        rows: &Bound<'_, PyAny>,
        headers: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<u64> {
        let l_headers = parse_optional_headers(headers)?;
        let mut cnt_schema_mismatch = 0u64;
        for row in rows.try_iter()? {
            let record = parse_record(py, &row?)?;
            cnt_schema_mismatch += self
                .inner
                .write_row(&record, &l_headers)
                .map_err(map_tabular_error)?;
        }
        Ok(cnt_schema_mismatch)
    }

    #[pyo3(signature = (headers = None))]
    fn write_separator(&mut self, headers: Option<&Bound<'_, PyAny>>) -> PyResult<()> {
        let l_headers = parse_optional_headers(headers)?;
        self.inner
            .write_separator(&l_headers)
            .map_err(map_tabular_error)
    }

    #[pyo3(signature = (cell = None))]
    fn freeze_panes(&mut self, cell: Option<&str>) -> PyResult<()> {
        self.inner.freeze_panes(cell).map_err(map_tabular_error)
    }

    #[pyo3(signature = (cell = None))]
    fn add_horizontal_page_break(&mut self, cell: Option<&str>) -> PyResult<()> {
        self.inner
            .add_horizontal_page_break(cell)
            .map_err(map_tabular_error)
    }

    fn reset_current_row(&mut self, pos: u32) -> PyResult<()> {
        self.inner.reset_current_row(pos).map_err(map_tabular_error)
    }

    fn current_row(&self) -> u32 {
        self.inner.current_row()
    }

    #[pyo3(signature = (cache_file, headers, freeze_headers = false))]
    fn prepare(
        &mut self,
        py: Python<'_>,
        cache_file: &str,
        headers: &Bound<'_, PyAny>,
        freeze_headers: bool,
    ) -> PyResult<Py<PyDict>> {
        let l_headers = parse_headers(headers)?;
        let reader = CacheReader::open(cache_file).map_err(map_tabular_error)?;
        let report = self
            .inner
            .prepare(reader, &l_headers)
            .map_err(map_tabular_error)?;
        if freeze_headers {
            self.inner.freeze_panes(None).map_err(map_tabular_error)?;
        }
        convert_report_to_dict(py, &report)
    }
}

/// Discover the header list of a cache file.
#[pyfunction]
fn collect_headers(py: Python<'_>, cache_file: &str) -> PyResult<Py<PyList>> {
    let l_headers = collect_headers_from_cache(cache_file).map_err(map_tabular_error)?;
    convert_headers_to_list(py, &l_headers)
}

/// Write a cache file as CSV; headers are discovered when omitted.
#[pyfunction]
#[pyo3(signature = (cache_file, file_out, headers = None, write_options = None))]
fn write_csv_from_cache(
    py: Python<'_>,
    cache_file: &str,
    file_out: &str,
    headers: Option<&Bound<'_, PyAny>>,
    write_options: Option<&Bound<'_, PyAny>>,
) -> PyResult<Py<PyDict>> {
    let l_headers = match headers {
        Some(obj) if !obj.is_none() => Some(parse_headers(obj)?),
        _ => None,
    };
    let cfg_write_options = parse_spec_csv_write_options(write_options)?
        .unwrap_or_else(derive_default_csv_write_options);

    let report = export_cache_to_csv(cache_file, file_out, l_headers.as_deref(), cfg_write_options)
        .map_err(map_tabular_error)?;
    convert_report_to_dict(py, &report)
}

/// Write a cache file as a single-sheet workbook; headers are discovered when omitted.
#[pyfunction]
#[pyo3(signature = (cache_file, file_out, headers = None, write_options = None))]
fn write_xlsx_from_cache(
    py: Python<'_>,
    cache_file: &str,
    file_out: &str,
    headers: Option<&Bound<'_, PyAny>>,
    write_options: Option<&Bound<'_, PyAny>>,
) -> PyResult<Py<PyDict>> {
    let l_headers = match headers {
        Some(obj) if !obj.is_none() => Some(parse_headers(obj)?),
        _ => None,
    };
    let cfg_write_options = parse_spec_xlsx_write_options(write_options)?
        .unwrap_or_else(derive_default_xlsx_write_options);

    let report = export_cache_to_xlsx(cache_file, file_out, l_headers.as_deref(), cfg_write_options)
        .map_err(map_tabular_error)?;
    convert_report_to_dict(py, &report)
}

fn map_tabular_error(err: TabularWriteError) -> PyErr {
    match err {
        TabularWriteError::Io(err_io) => PyOSError::new_err(err_io.to_string()),
        TabularWriteError::WriterClosed => PyRuntimeError::new_err(err.to_string()),
        _ => PyValueError::new_err(err.to_string()),
    }
}

fn parse_record(py: Python<'_>, obj: &Bound<'_, PyAny>) -> PyResult<SpecRecord> {
    let module_json = py.import("json")?;
    let c_text: String = module_json.call_method1("dumps", (obj,))?.extract()?;
    SpecRecord::from_json_str(&c_text)
        .ok_or_else(|| PyValueError::new_err("Row must be a dict or a list."))
}

fn parse_optional_headers(obj: Option<&Bound<'_, PyAny>>) -> PyResult<Vec<EnumHeader>> {
    match obj {
        Some(obj) if !obj.is_none() => parse_headers(obj),
        _ => Ok(Vec::new()),
    }
}

fn parse_headers(obj: &Bound<'_, PyAny>) -> PyResult<Vec<EnumHeader>> {
    let mut l_headers = Vec::new();
    for item in obj.try_iter()? {
        let item = item?;
        if let Ok(c_name) = item.extract::<String>() {
            l_headers.push(EnumHeader::Simple(c_name));
            continue;
        }
        let Ok(dict_nested) = item.downcast::<PyDict>() else {
            return Err(PyValueError::new_err(
                "Headers must be str or dict[str, list[str]].",
            ));
        };
        for (key, val) in dict_nested.iter() {
            l_headers.push(EnumHeader::Nested {
                name: key.extract::<String>()?,
                children: val.extract::<Vec<String>>()?,
            });
        }
    }
    Ok(l_headers)
}

fn convert_headers_to_list(py: Python<'_>, headers: &[EnumHeader]) -> PyResult<Py<PyList>> {
    let mut l_items: Vec<Py<PyAny>> = Vec::with_capacity(headers.len());
    for header in headers {
        match header {
            EnumHeader::Simple(name) => {
                l_items.push(PyString::new(py, name).into_any().unbind());
            }
            EnumHeader::Nested { name, children } => {
                let dict_nested = PyDict::new(py);
                dict_nested.set_item(name, children.clone())?;
                l_items.push(dict_nested.into_any().unbind());
            }
        }
    }
    Ok(PyList::new(py, l_items)?.unbind())
}

fn convert_report_to_dict(py: Python<'_>, report: &ReportExport) -> PyResult<Py<PyDict>> {
    let dict_report = PyDict::new(py);
    for (key, val) in report.to_dict() {
        dict_report.set_item(key, val)?;
    }
    dict_report.set_item("warnings", report.warnings.clone())?;
    Ok(dict_report.unbind())
}

fn parse_rule_header_render(value: &str) -> PyResult<EnumHeaderRenderMode> {
    match value {
        "merge" => Ok(EnumHeaderRenderMode::Merge),
        "flatten" => Ok(EnumHeaderRenderMode::Flatten),
        "children_only" => Ok(EnumHeaderRenderMode::ChildrenOnly),
        _ => Err(PyValueError::new_err(
            "rule_header_render must be one of: 'merge', 'flatten', 'children_only'.",
        )),
    }
}

fn parse_spec_cell_format(obj: Option<&Bound<'_, PyAny>>) -> PyResult<Option<SpecCellFormat>> {
    let Some(obj) = obj else {
        return Ok(None);
    };
    if obj.is_none() {
        return Ok(None);
    }

    Ok(Some(SpecCellFormat {
        font_name: extract_optional_attr::<String>(obj, "font_name")?,
        font_size: extract_optional_attr::<i64>(obj, "font_size")?,
        bold: extract_optional_attr::<bool>(obj, "bold")?,
        italic: extract_optional_attr::<bool>(obj, "italic")?,
        align: extract_optional_attr::<String>(obj, "align")?,
        valign: extract_optional_attr::<String>(obj, "valign")?,
        bottom: extract_optional_attr::<i64>(obj, "bottom")?,
        text_wrap: extract_optional_attr::<bool>(obj, "text_wrap")?,
        num_format: extract_optional_attr::<String>(obj, "num_format")?,
    }))
}

fn parse_spec_autofit_cells_policy(
    obj: Option<&Bound<'_, PyAny>>,
) -> PyResult<Option<SpecAutofitCellsPolicy>> {
    let Some(obj) = obj else {
        return Ok(None);
    };
    if obj.is_none() {
        return Ok(None);
    }

    let mut policy = SpecAutofitCellsPolicy::default();
    if let Some(v) = extract_optional_attr::<usize>(obj, "width_cell_min")? {
        policy.width_cell_min = v;
    }
    if let Some(v) = extract_optional_attr::<usize>(obj, "width_cell_max")? {
        policy.width_cell_max = v;
    }
    if let Some(v) = extract_optional_attr::<usize>(obj, "width_cell_padding")? {
        policy.width_cell_padding = v;
    }
    if policy.width_cell_max < policy.width_cell_min {
        return Err(PyValueError::new_err(
            "policy_autofit.width_cell_max must be >= policy_autofit.width_cell_min.",
        ));
    }

    Ok(Some(policy))
}

fn parse_spec_xlsx_write_options(
    obj: Option<&Bound<'_, PyAny>>,
) -> PyResult<Option<SpecXlsxWriteOptions>> {
    let Some(obj) = obj else {
        return Ok(None);
    };
    if obj.is_none() {
        return Ok(None);
    }

    let mut cfg_write_options = derive_default_xlsx_write_options();
    let dict_default_fmts = derive_default_tabular_formats();

    if let Some(v) = extract_optional_attr::<u32>(obj, "n_row_start")? {
        cfg_write_options.n_row_start = v;
    }
    if let Some(v) = extract_optional_attr::<String>(obj, "cell_freeze_default")? {
        cfg_write_options.cell_freeze_default = Some(v);
    }
    if let Some(v) = extract_optional_attr::<String>(obj, "rule_header_render")? {
        cfg_write_options.rule_header_render = parse_rule_header_render(&v)?;
    }
    if let Some(v) = extract_optional_attr::<bool>(obj, "if_collapse_single_row")? {
        cfg_write_options.if_collapse_single_row = v;
    }
    if let Some(v) = extract_optional_attr::<bool>(obj, "if_freeze_headers")? {
        cfg_write_options.if_freeze_headers = v;
    }
    if let Some(v) = extract_optional_attr::<bool>(obj, "if_autosize_columns")? {
        cfg_write_options.if_autosize_columns = v;
    }
    if let Some(v) = extract_optional_attr::<bool>(obj, "if_landscape")? {
        cfg_write_options.if_landscape = v;
    }
    if let Some(policy_obj) = extract_optional_attr_bound(obj, "policy_autofit")?
        && let Some(policy) = parse_spec_autofit_cells_policy(Some(&policy_obj))?
    {
        cfg_write_options.policy_autofit = policy;
    }

    for (c_attr, c_preset) in [
        ("fmt_header", "header"),
        ("fmt_text", "text"),
        ("fmt_separator", "separator"),
    ] {
        let Some(fmt_obj) = extract_optional_attr_bound(obj, c_attr)? else {
            continue;
        };
        let Some(fmt_patch) = parse_spec_cell_format(Some(&fmt_obj))? else {
            continue;
        };
        let fmt_base = dict_default_fmts.get(c_preset).cloned().unwrap_or_default();
        let fmt_final = fmt_base.with_(fmt_patch);
        match c_attr {
            "fmt_header" => cfg_write_options.fmt_header = fmt_final,
            "fmt_text" => cfg_write_options.fmt_text = fmt_final,
            _ => cfg_write_options.fmt_separator = fmt_final,
        }
    }

    Ok(Some(cfg_write_options))
}

fn parse_spec_csv_write_options(
    obj: Option<&Bound<'_, PyAny>>,
) -> PyResult<Option<SpecCsvWriteOptions>> {
    let Some(obj) = obj else {
        return Ok(None);
    };
    if obj.is_none() {
        return Ok(None);
    }

    let mut cfg_write_options = derive_default_csv_write_options();
    if let Some(v) = extract_optional_attr::<String>(obj, "rule_header_render")? {
        cfg_write_options.rule_header_render = parse_rule_header_render(&v)?;
    }
    if let Some(v) = extract_optional_attr::<bool>(obj, "if_collapse_single_row")? {
        cfg_write_options.if_collapse_single_row = v;
    }
    if let Some(v) = extract_optional_attr::<String>(obj, "delimiter")? {
        let [n_byte] = v.as_bytes() else {
            return Err(PyValueError::new_err(
                "delimiter must be a single ASCII character.",
            ));
        };
        cfg_write_options.delimiter = *n_byte;
    }

    Ok(Some(cfg_write_options))
}

fn extract_optional_attr<T>(obj: &Bound<'_, PyAny>, attr: &str) -> PyResult<Option<T>>
where
    for<'a> T: FromPyObject<'a>,
{
    if !obj.hasattr(attr)? {
        return Ok(None);
    }
    let val = obj.getattr(attr)?;
    if val.is_none() {
        return Ok(None);
    }
    Ok(Some(val.extract::<T>()?))
}

fn extract_optional_attr_bound<'py>(
    obj: &Bound<'py, PyAny>,
    attr: &str,
) -> PyResult<Option<Bound<'py, PyAny>>> {
    if !obj.hasattr(attr)? {
        return Ok(None);
    }
    let val = obj.getattr(attr)?;
    if val.is_none() {
        return Ok(None);
    }
    Ok(Some(val))
}

#[pymodule]
fn _reportkit_io_tabular_rs(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PyXlsxWriter>()?;
    module.add_function(wrap_pyfunction!(collect_headers, module)?)?;
    module.add_function(wrap_pyfunction!(write_csv_from_cache, module)?)?;
    module.add_function(wrap_pyfunction!(write_xlsx_from_cache, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    Ok(())
}
