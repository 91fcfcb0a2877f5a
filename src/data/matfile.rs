//! Minimal MAT-file reader for the numeric matrices that carry ECG samples.
//!
//! Level 4 files (the layout `wfdb2mat` writes) are read in either byte order
//! and any numeric precision. Level 5 files are read whether the matrix is
//! stored plainly or inside a zlib-compressed element (the `-v7` default).

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use flate2::read::ZlibDecoder;
use ndarray::{Array2, ShapeBuilder};

/// Codec-level failure, without knowledge of which record it came from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatError {
    #[error("truncated: {0}")]
    Truncated(String),

    #[error("malformed: {0}")]
    Malformed(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("no matrix named '{0}'")]
    MissingVariable(String),
}

type MatResult<T> = Result<T, MatError>;

const LEVEL5_HEADER_LEN: usize = 128;
const LEVEL5_MAGIC: &[u8] = b"MATLAB";
const LEVEL4_HEADER_LEN: usize = 20;

// Level 5 data element types
const MI_INT8: u32 = 1;
const MI_UINT32: u32 = 6;
const MI_INT32: u32 = 5;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;

// ---------------------------------------------------------------------------
// Byte order + element precision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn u32(self, b: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(b),
            Endian::Big => BigEndian::read_u32(b),
        }
    }

    fn i32(self, b: &[u8]) -> i32 {
        match self {
            Endian::Little => LittleEndian::read_i32(b),
            Endian::Big => BigEndian::read_i32(b),
        }
    }

    fn decode(self, numeric: Numeric, bytes: &[u8]) -> Vec<f64> {
        match self {
            Endian::Little => numeric.decode::<LittleEndian>(bytes),
            Endian::Big => numeric.decode::<BigEndian>(bytes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Numeric {
    F64,
    F32,
    I64,
    U64,
    I32,
    U32,
    I16,
    U16,
    I8,
    U8,
}

impl Numeric {
    /// Precision digit `P` of a Level 4 type code.
    fn from_level4(p: i32) -> Option<Self> {
        match p {
            0 => Some(Numeric::F64),
            1 => Some(Numeric::F32),
            2 => Some(Numeric::I32),
            3 => Some(Numeric::I16),
            4 => Some(Numeric::U16),
            5 => Some(Numeric::U8),
            _ => None,
        }
    }

    /// Data type of a Level 5 element.
    fn from_level5(data_type: u32) -> Option<Self> {
        match data_type {
            1 => Some(Numeric::I8),
            2 => Some(Numeric::U8),
            3 => Some(Numeric::I16),
            4 => Some(Numeric::U16),
            5 => Some(Numeric::I32),
            6 => Some(Numeric::U32),
            7 => Some(Numeric::F32),
            9 => Some(Numeric::F64),
            12 => Some(Numeric::I64),
            13 => Some(Numeric::U64),
            _ => None,
        }
    }

    fn width(self) -> usize {
        match self {
            Numeric::F64 | Numeric::I64 | Numeric::U64 => 8,
            Numeric::F32 | Numeric::I32 | Numeric::U32 => 4,
            Numeric::I16 | Numeric::U16 => 2,
            Numeric::I8 | Numeric::U8 => 1,
        }
    }

    fn decode<B: ByteOrder>(self, bytes: &[u8]) -> Vec<f64> {
        bytes
            .chunks_exact(self.width())
            .map(|c| match self {
                Numeric::F64 => B::read_f64(c),
                Numeric::F32 => B::read_f32(c) as f64,
                Numeric::I64 => B::read_i64(c) as f64,
                Numeric::U64 => B::read_u64(c) as f64,
                Numeric::I32 => B::read_i32(c) as f64,
                Numeric::U32 => B::read_u32(c) as f64,
                Numeric::I16 => B::read_i16(c) as f64,
                Numeric::U16 => B::read_u16(c) as f64,
                Numeric::I8 => c[0] as i8 as f64,
                Numeric::U8 => c[0] as f64,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Cursor over the file bytes
// ---------------------------------------------------------------------------

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Self {
        Cursor { bytes, pos }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize, what: &str) -> MatResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(MatError::Truncated(format!(
                "{what} needs {n} bytes at offset {}, only {} left",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Skip up to the next 8-byte boundary after a `len`-byte payload.
    fn skip_padding(&mut self, len: usize) {
        let pad = (8 - len % 8) % 8;
        self.pos += pad.min(self.remaining());
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Decode the matrix called `name` from MAT-file bytes as `[rows × cols]`.
pub fn read_matrix(bytes: &[u8], name: &str) -> MatResult<Array2<f64>> {
    if bytes.starts_with(LEVEL5_MAGIC) {
        read_level5(bytes, name)
    } else {
        read_level4(bytes, name)
    }
}

/// Storage precision for [`write_level4`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Double,
    /// Values are rounded and saturated to `i16`, like WFDB 16-bit samples.
    Int16,
}

/// Write one little-endian Level 4 matrix.
pub fn write_level4<W: Write>(
    out: &mut W,
    name: &str,
    matrix: &Array2<f64>,
    precision: Precision,
) -> io::Result<()> {
    let (rows, cols) = matrix.dim();
    let type_code = match precision {
        Precision::Double => 0,
        Precision::Int16 => 30,
    };
    let to_i32 = |n: usize| {
        i32::try_from(n).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "matrix too large"))
    };
    out.write_i32::<LittleEndian>(type_code)?;
    out.write_i32::<LittleEndian>(to_i32(rows)?)?;
    out.write_i32::<LittleEndian>(to_i32(cols)?)?;
    out.write_i32::<LittleEndian>(0)?;
    out.write_i32::<LittleEndian>(to_i32(name.len() + 1)?)?;
    out.write_all(name.as_bytes())?;
    out.write_u8(0)?;

    // column-major
    for &v in matrix.t().iter() {
        match precision {
            Precision::Double => out.write_f64::<LittleEndian>(v)?,
            Precision::Int16 => out.write_i16::<LittleEndian>(v.round() as i16)?,
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Level 4
// ---------------------------------------------------------------------------

fn read_level4(bytes: &[u8], name: &str) -> MatResult<Array2<f64>> {
    let mut cur = Cursor::new(bytes, 0);
    if cur.is_empty() {
        return Err(MatError::Truncated("empty file".into()));
    }

    while !cur.is_empty() {
        let head = cur.take(LEVEL4_HEADER_LEN, "matrix header")?;
        let endian = level4_endian(head)?;
        let type_code = endian.i32(&head[0..4]);
        let order = (type_code / 100) % 10;
        let precision = (type_code / 10) % 10;
        let kind = type_code % 10;
        if order != 0 {
            return Err(MatError::Malformed(format!("type code {type_code}")));
        }

        let rows = non_negative(endian.i32(&head[4..8]), "row count")?;
        let cols = non_negative(endian.i32(&head[8..12]), "column count")?;
        let imaginary = endian.i32(&head[12..16]) != 0;
        let name_len = non_negative(endian.i32(&head[16..20]), "name length")?;

        let raw_name = cur.take(name_len, "matrix name")?;
        let var_name = String::from_utf8_lossy(raw_name);
        let var_name = var_name.trim_end_matches('\0');

        let numeric = Numeric::from_level4(precision)
            .ok_or_else(|| MatError::Malformed(format!("precision digit {precision}")))?;
        let count = element_count(rows, cols)?;
        let real_len = count
            .checked_mul(numeric.width())
            .ok_or_else(|| MatError::Malformed("matrix size overflows".into()))?;
        // complex matrices store the imaginary part after the real part
        let total_len = if imaginary {
            real_len
                .checked_mul(2)
                .ok_or_else(|| MatError::Malformed("complex matrix size overflows".into()))?
        } else {
            real_len
        };
        let data = cur.take(total_len, "matrix data")?;

        if var_name == name {
            if kind != 0 {
                return Err(MatError::Unsupported(format!(
                    "'{var_name}' is not a full numeric matrix (type code {type_code})"
                )));
            }
            let values = endian.decode(numeric, &data[..real_len]);
            return column_major(rows, cols, values);
        }
        log::trace!("skipping level 4 matrix '{var_name}'");
    }

    Err(MatError::MissingVariable(name.to_string()))
}

/// Byte order is whichever makes the thousands digit of the type code 0
/// (little-endian) or 1 (big-endian).
fn level4_endian(head: &[u8]) -> MatResult<Endian> {
    let le = LittleEndian::read_i32(&head[0..4]);
    if (0..1000).contains(&le) {
        return Ok(Endian::Little);
    }
    let be = BigEndian::read_i32(&head[0..4]);
    if (1000..2000).contains(&be) {
        return Ok(Endian::Big);
    }
    Err(MatError::Malformed(format!(
        "not a MAT-file (leading bytes {:02x?})",
        &head[0..4]
    )))
}

// ---------------------------------------------------------------------------
// Level 5
// ---------------------------------------------------------------------------

fn read_level5(bytes: &[u8], name: &str) -> MatResult<Array2<f64>> {
    if bytes.len() < LEVEL5_HEADER_LEN {
        return Err(MatError::Truncated(format!(
            "level 5 header needs {LEVEL5_HEADER_LEN} bytes, file has {}",
            bytes.len()
        )));
    }
    let endian = match &bytes[126..128] {
        b"IM" => Endian::Little,
        b"MI" => Endian::Big,
        other => {
            return Err(MatError::Malformed(format!(
                "endian indicator {other:02x?}"
            )))
        }
    };

    let cur = Cursor::new(bytes, LEVEL5_HEADER_LEN);
    find_level5_matrix(cur, endian, name, true)?
        .ok_or_else(|| MatError::MissingVariable(name.to_string()))
}

/// Walk top-level elements looking for the matrix called `name`. Compressed
/// elements hold one further element stream, which is never compressed again.
fn find_level5_matrix(
    mut cur: Cursor<'_>,
    endian: Endian,
    name: &str,
    inflate_compressed: bool,
) -> MatResult<Option<Array2<f64>>> {
    while !cur.is_empty() {
        let (data_type, payload) = read_element(&mut cur, endian)?;
        match data_type {
            MI_MATRIX => {
                if let Some(matrix) = read_level5_matrix(payload, endian, name)? {
                    return Ok(Some(matrix));
                }
            }
            MI_COMPRESSED if inflate_compressed => {
                let inflated = inflate(payload)?;
                let inner = Cursor::new(&inflated, 0);
                if let Some(matrix) = find_level5_matrix(inner, endian, name, false)? {
                    return Ok(Some(matrix));
                }
            }
            other => log::trace!("skipping level 5 element of type {other}"),
        }
    }
    Ok(None)
}

fn inflate(payload: &[u8]) -> MatResult<Vec<u8>> {
    let mut inflated = Vec::new();
    ZlibDecoder::new(payload)
        .read_to_end(&mut inflated)
        .map_err(|e| MatError::Malformed(format!("compressed element: {e}")))?;
    log::trace!("inflated {} bytes to {}", payload.len(), inflated.len());
    Ok(inflated)
}

/// Read one tagged element, returning its type and payload.
fn read_element<'a>(cur: &mut Cursor<'a>, endian: Endian) -> MatResult<(u32, &'a [u8])> {
    let tag = cur.take(8, "element tag")?;
    let first = endian.u32(&tag[0..4]);
    let small_len = (first >> 16) as usize;
    if small_len != 0 {
        // small element: type and size packed into 4 bytes, data in the other 4
        if small_len > 4 {
            return Err(MatError::Malformed(format!(
                "small element claims {small_len} bytes"
            )));
        }
        return Ok((first & 0xFFFF, &tag[4..4 + small_len]));
    }

    let len = endian.u32(&tag[4..8]) as usize;
    let payload = cur.take(len, "element data")?;
    // compressed elements are not padded to 8 bytes
    if first != MI_COMPRESSED {
        cur.skip_padding(len);
    }
    Ok((first, payload))
}

fn read_level5_matrix(
    payload: &[u8],
    endian: Endian,
    name: &str,
) -> MatResult<Option<Array2<f64>>> {
    let mut cur = Cursor::new(payload, 0);

    let (flags_type, flags) = read_element(&mut cur, endian)?;
    if flags_type != MI_UINT32 || flags.len() < 4 {
        return Err(MatError::Malformed("array flags subelement".into()));
    }
    let flags = endian.u32(&flags[0..4]);
    let class = flags & 0xFF;

    let (dims_type, dims) = read_element(&mut cur, endian)?;
    if dims_type != MI_INT32 {
        return Err(MatError::Malformed("dimensions subelement".into()));
    }
    let dims: Vec<i32> = dims.chunks_exact(4).map(|c| endian.i32(c)).collect();

    let (name_type, raw_name) = read_element(&mut cur, endian)?;
    if name_type != MI_INT8 {
        return Err(MatError::Malformed("array name subelement".into()));
    }
    if raw_name != name.as_bytes() {
        return Ok(None);
    }

    // mxDOUBLE_CLASS (6) through mxUINT64_CLASS (15)
    if !(6..=15).contains(&class) {
        return Err(MatError::Unsupported(format!(
            "'{name}' has non-numeric array class {class}"
        )));
    }
    let (rows, cols) = match dims.as_slice() {
        [r, c] => (non_negative(*r, "row count")?, non_negative(*c, "column count")?),
        other => {
            return Err(MatError::Unsupported(format!(
                "'{name}' has {} dimensions",
                other.len()
            )))
        }
    };

    let (real_type, real) = read_element(&mut cur, endian)?;
    let numeric = Numeric::from_level5(real_type)
        .ok_or_else(|| MatError::Malformed(format!("real part data type {real_type}")))?;
    let values = endian.decode(numeric, real);
    let count = element_count(rows, cols)?;
    if values.len() != count {
        return Err(MatError::Truncated(format!(
            "'{name}' declares {count} values, holds {}",
            values.len()
        )));
    }
    column_major(rows, cols, values).map(Some)
}

// -- helpers --

fn non_negative(value: i32, what: &str) -> MatResult<usize> {
    usize::try_from(value).map_err(|_| MatError::Malformed(format!("{what} is {value}")))
}

fn element_count(rows: usize, cols: usize) -> MatResult<usize> {
    rows.checked_mul(cols)
        .ok_or_else(|| MatError::Malformed(format!("{rows} × {cols} overflows")))
}

/// Arrange column-major values as a standard (row-major) array.
fn column_major(rows: usize, cols: usize, values: Vec<f64>) -> MatResult<Array2<f64>> {
    let array = Array2::from_shape_vec((rows, cols).f(), values)
        .map_err(|e| MatError::Malformed(e.to_string()))?;
    Ok(array.as_standard_layout().into_owned())
}
