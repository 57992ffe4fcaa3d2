//! Virtual dataset (VRT) documents.
//!
//! One `VRTRasterBand` is written per band selection. Raw and named bands get
//! a single `SimpleSource`; pixel-function bands are `VRTDerivedRasterBand`s
//! with one source per distinct band the function reads. Alpha is skipped:
//! only the warp step produces it.

use landsat_common::{BandMap, LandsatError, LandsatResult};
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::debug;

use crate::band::RasterBandMetadata;
use crate::composite::RasterMetadata;
use crate::selection::{BandSelection, FunctionDetails};

/// Block size advertised for every source.
pub const SOURCE_BLOCK_SIZE: usize = 256;

/// C-style `%.16e`: mantissa with 16 decimals, signed two-digit exponent.
pub fn format_sci(value: f64) -> String {
    let formatted = format!("{:.16e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exponent.abs())
        }
        None => formatted,
    }
}

fn xml_error(e: quick_xml::Error) -> LandsatError {
    LandsatError::Serialization(format!("VRT write failed: {}", e))
}

struct VrtWriter<'a> {
    scene_id: &'a str,
    composite: &'a RasterMetadata,
    band_map: &'a BandMap,
    writer: Writer<Vec<u8>>,
}

impl<'a> VrtWriter<'a> {
    fn event(&mut self, event: Event<'_>) -> LandsatResult<()> {
        self.writer.write_event(event).map_err(xml_error)
    }

    fn start(&mut self, element: BytesStart<'_>) -> LandsatResult<()> {
        self.event(Event::Start(element))
    }

    fn end(&mut self, name: &str) -> LandsatResult<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text_element(&mut self, name: &str, text: &str) -> LandsatResult<()> {
        self.start(BytesStart::new(name))?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    /// Write `text` as CDATA, splitting every `]]>` across two sections.
    fn cdata(&mut self, text: &str) -> LandsatResult<()> {
        let mut rest = text;
        while let Some(pos) = rest.find("]]>") {
            self.event(Event::CData(BytesCData::new(&rest[..pos + 2])))?;
            rest = &rest[pos + 2..];
        }
        self.event(Event::CData(BytesCData::new(rest)))
    }

    fn band(&self, number: u32) -> LandsatResult<&'a RasterBandMetadata> {
        self.composite.band(number).ok_or_else(|| {
            LandsatError::composition(self.scene_id, format!("band {} was not loaded", number))
        })
    }

    fn dataset(&mut self, selections: &[BandSelection]) -> LandsatResult<()> {
        let (x_size, y_size) = self.composite.size()?;
        let geo_transform = self.composite.geo_transform()?;
        let projection = self.composite.projection()?.to_string();

        let (x, y) = (x_size.to_string(), y_size.to_string());
        self.start(
            BytesStart::new("VRTDataset")
                .with_attributes([("rasterXSize", x.as_str()), ("rasterYSize", y.as_str())]),
        )?;
        self.text_element("SRS", &projection)?;
        let transform: Vec<String> = geo_transform.iter().map(|v| format_sci(*v)).collect();
        self.text_element("GeoTransform", &transform.join(", "))?;

        let mut index = 0;
        for selection in selections {
            match selection {
                BandSelection::Raw(number) => {
                    index += 1;
                    let name = self.band_map.name(*number).ok();
                    self.raw_band(index, *number, name.and_then(|n| n.color_interpretation()))?;
                }
                BandSelection::Named(name) if selection.is_alpha() => {
                    debug!(band = %name, "Alpha band left to the warp step");
                }
                BandSelection::Named(name) => {
                    index += 1;
                    let number = self.band_map.number(*name)?;
                    self.raw_band(index, number, name.color_interpretation())?;
                }
                BandSelection::Function(function) => {
                    index += 1;
                    self.function_band(index, function)?;
                }
            }
        }

        self.end("VRTDataset")
    }

    fn raw_band(&mut self, index: usize, number: u32, color: Option<&str>) -> LandsatResult<()> {
        let band = self.band(number)?;
        let index = index.to_string();
        self.start(BytesStart::new("VRTRasterBand").with_attributes([
            ("dataType", band.data_type.gdal_name()),
            ("band", index.as_str()),
        ]))?;
        if let Some(color) = color {
            self.text_element("ColorInterp", color)?;
        }
        self.simple_source(band)?;
        self.end("VRTRasterBand")
    }

    fn function_band(&mut self, index: usize, function: &FunctionDetails) -> LandsatResult<()> {
        let index = index.to_string();
        self.start(BytesStart::new("VRTRasterBand").with_attributes([
            ("dataType", function.data_type.gdal_name()),
            ("band", index.as_str()),
            ("subClass", "VRTDerivedRasterBand"),
        ]))?;

        self.text_element("PixelFunctionType", &function.name)?;
        if let Some(language) = function.language() {
            self.text_element("PixelFunctionLanguage", language)?;
        }
        if let Some(code) = &function.code {
            self.start(BytesStart::new("PixelFunctionCode"))?;
            self.cdata(code)?;
            self.end("PixelFunctionCode")?;
        }
        if !function.arguments.is_empty() {
            let arguments = BytesStart::new("PixelFunctionArguments").with_attributes(
                function
                    .arguments
                    .iter()
                    .map(|(key, value)| (key.as_str(), value.as_str())),
            );
            self.event(Event::Empty(arguments))?;
        }
        if let Some(transfer_type) = function.transfer_type {
            self.text_element("SourceTransferType", transfer_type.gdal_name())?;
        }

        for number in function.source_numbers(self.band_map)? {
            let band = self.band(number)?;
            self.simple_source(band)?;
        }
        self.end("VRTRasterBand")
    }

    fn simple_source(&mut self, band: &RasterBandMetadata) -> LandsatResult<()> {
        self.start(BytesStart::new("SimpleSource"))?;

        let path = band.file_path.display().to_string();
        self.start(BytesStart::new("SourceFilename").with_attributes([("relativeToVRT", "0")]))?;
        self.event(Event::Text(BytesText::new(&path)))?;
        self.end("SourceFilename")?;

        self.text_element("SourceBand", "1")?;

        let x_src = band.x_src_size.to_string();
        let y_src = band.y_src_size.to_string();
        let block = SOURCE_BLOCK_SIZE.to_string();
        self.event(Event::Empty(BytesStart::new("SourceProperties").with_attributes([
            ("RasterXSize", x_src.as_str()),
            ("RasterYSize", y_src.as_str()),
            ("DataType", band.data_type.gdal_name()),
            ("BlockXSize", block.as_str()),
            ("BlockYSize", block.as_str()),
        ])))?;

        let x_size = band.x_dst_size.to_string();
        let y_size = band.y_dst_size.to_string();
        let (src_x, src_y) = (band.x_src_offset.to_string(), band.y_src_offset.to_string());
        self.event(Event::Empty(BytesStart::new("SrcRect").with_attributes([
            ("xOff", src_x.as_str()),
            ("yOff", src_y.as_str()),
            ("xSize", x_size.as_str()),
            ("ySize", y_size.as_str()),
        ])))?;

        let (dst_x, dst_y) = (band.x_dst_offset.to_string(), band.y_dst_offset.to_string());
        self.event(Event::Empty(BytesStart::new("DstRect").with_attributes([
            ("xOff", dst_x.as_str()),
            ("yOff", dst_y.as_str()),
            ("xSize", x_size.as_str()),
            ("ySize", y_size.as_str()),
        ])))?;

        self.end("SimpleSource")
    }
}

/// Write the VRT document of one scene's composite for `selections`.
pub fn write_vrt(
    scene_id: &str,
    composite: &RasterMetadata,
    band_map: &BandMap,
    selections: &[BandSelection],
) -> LandsatResult<String> {
    let mut vrt = VrtWriter {
        scene_id,
        composite,
        band_map,
        writer: Writer::new_with_indent(Vec::new(), b' ', 2),
    };
    vrt.dataset(selections)?;

    String::from_utf8(vrt.writer.into_inner())
        .map_err(|e| LandsatError::Serialization(format!("VRT is not UTF-8: {}", e)))
}
