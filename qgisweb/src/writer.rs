use std::fs::{self, File};
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};

use log::debug;
use tilepack_tile_utils::GeoExtent;

use crate::{ExtentParams, QwError, QwResult, TileRecord};

/// Streaming writer of the plain JSON container document.
///
/// The header is written on [`QgisWebWriter::create`], each tile record is appended as
/// it arrives, and [`QgisWebWriter::finish`] closes the document. Only one tile record
/// is ever held in memory.
///
/// The output layout is fixed:
///
/// ```text
/// {
///   "params": {
///     "extent": {
///       "lon_min": "0,00000000",
///       ...
///     }
///   },
///   "tiles": [
///     {"x": "1", "y": "2", "z": "3", "t": "iVBOR..."},
///     {"x": "1", "y": "3", "z": "3", "t": "iVBOR..."}
///   ]
/// }
/// ```
pub struct QgisWebWriter {
    path: PathBuf,
    out: BufWriter<File>,
    tiles_written: u64,
}

impl QgisWebWriter {
    /// Creates (or truncates) the container file and writes the header for `extent`.
    ///
    /// Finite coordinates are clamped to the tiled world before they are written.
    /// Non-finite ones are written as [`NON_FINITE_COORD`](crate::NON_FINITE_COORD).
    pub fn create(path: impl Into<PathBuf>, extent: &GeoExtent) -> QwResult<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| QwError::CreateFailed(e, path.clone()))?;
        let mut writer = Self {
            out: BufWriter::new(file),
            path,
            tiles_written: 0,
        };
        let params = ExtentParams::from_extent(&header_extent(extent));
        writer.write_header(&params)?;
        debug!("Started container {}", writer.path.display());
        Ok(writer)
    }

    fn write_header(&mut self, p: &ExtentParams) -> QwResult<()> {
        let res = write!(
            self.out,
            concat!(
                "{{\n",
                "  \"params\": {{\n",
                "    \"extent\": {{\n",
                "      \"lon_min\": \"{}\",\n",
                "      \"lon_max\": \"{}\",\n",
                "      \"lat_min\": \"{}\",\n",
                "      \"lat_max\": \"{}\",\n",
                "      \"dxy\": \"{}\",\n",
                "      \"dh\": \"{}\",\n",
                "      \"epsg\": \"{}\"\n",
                "    }}\n",
                "  }},\n",
                "  \"tiles\": [\n",
            ),
            p.lon_min, p.lon_max, p.lat_min, p.lat_max, p.dxy, p.dh, p.epsg
        );
        res.map_err(|e| QwError::WriteFailed(e, self.path.clone()))
    }

    /// Appends one tile record to the `tiles` array.
    pub fn write_tile(&mut self, tile: &TileRecord) -> QwResult<()> {
        let separator = if self.tiles_written == 0 { "    " } else { ",\n    " };
        write!(
            self.out,
            r#"{separator}{{"x": "{}", "y": "{}", "z": "{}", "t": "{}"}}"#,
            tile.x, tile.y, tile.z, tile.t
        )
        .map_err(|e| QwError::WriteFailed(e, self.path.clone()))?;
        self.tiles_written += 1;
        Ok(())
    }

    #[must_use]
    pub fn tiles_written(&self) -> u64 {
        self.tiles_written
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the `tiles` array and the document, and flushes it to disk.
    pub fn finish(mut self) -> QwResult<PathBuf> {
        let closing = if self.tiles_written == 0 {
            "]\n}\n"
        } else {
            "\n  ]\n}\n"
        };
        self.out
            .write_all(closing.as_bytes())
            .and_then(|()| self.out.flush())
            .and_then(|()| self.out.get_ref().sync_all())
            .map_err(|e| QwError::WriteFailed(e, self.path.clone()))?;
        debug!(
            "Closed container {} with {} tiles",
            self.path.display(),
            self.tiles_written
        );
        Ok(self.path)
    }

    /// Abandons the document and removes the partially written file.
    pub fn discard(self) -> QwResult<()> {
        let Self { path, out, .. } = self;
        drop(out);
        fs::remove_file(&path).map_err(|e| QwError::WriteFailed(e, path.clone()))?;
        debug!("Removed unfinished container {}", path.display());
        Ok(())
    }
}

/// Clamps the finite coordinates of `extent` and turns the others into NaN.
fn header_extent(extent: &GeoExtent) -> GeoExtent {
    let clamped = extent.clamped();
    let pick = |raw: f64, clamped: f64| if raw.is_finite() { clamped } else { f64::NAN };
    GeoExtent::new(
        pick(extent.west, clamped.west),
        pick(extent.south, clamped.south),
        pick(extent.east, clamped.east),
        pick(extent.north, clamped.north),
    )
}
