//! Per-unit dimensional, lot and customs attributes.
//!
//! An [`AttributeSet`] travels with a fulfillment unit from the sale line down
//! to the lot that is finally received. Every stage stores its own copy.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Canonical attribute bundle of one physical unit (e.g. a stone slab).
///
/// Dimensions are in metres, thickness in centimetres, area in square metres.
/// Text fields default to the empty string, never to "absent", so that derived
/// values downstream are deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeSet {
    pub height: f64,
    pub width: f64,
    pub thickness: f64,
    pub area: f64,
    /// Free-text lot label ("lote general"); also the lot sequence scope.
    pub lot_label: String,
    /// Bundle / container identifier.
    pub container: String,
    /// Customs clearance (pedimento) number.
    pub customs_number: String,
}

impl ValueObject for AttributeSet {}

impl AttributeSet {
    /// Attributes of a unit measured by height and width; area is derived.
    pub fn from_dimensions(height: f64, width: f64, thickness: f64) -> DomainResult<Self> {
        let mut attrs = Self {
            height: non_negative("height", height)?,
            width: non_negative("width", width)?,
            thickness: non_negative("thickness", thickness)?,
            ..Self::default()
        };
        attrs.recompute_area();
        Ok(attrs)
    }

    /// Attributes of a unit sold by area alone (no raw dimensions).
    pub fn from_area(area: f64) -> DomainResult<Self> {
        Ok(Self {
            area: non_negative("area", area)?,
            ..Self::default()
        })
    }

    pub fn with_lot_label(mut self, label: impl Into<String>) -> Self {
        self.lot_label = label.into();
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    pub fn with_customs_number(mut self, customs_number: impl Into<String>) -> Self {
        self.customs_number = customs_number.into();
        self
    }

    pub fn with_thickness(mut self, thickness: f64) -> DomainResult<Self> {
        self.thickness = non_negative("thickness", thickness)?;
        Ok(self)
    }

    /// Both height and width are positive.
    pub fn has_dimensions(&self) -> bool {
        self.height > 0.0 && self.width > 0.0
    }

    /// `height * width` when both dimensions are known.
    pub fn computed_area(&self) -> Option<f64> {
        self.has_dimensions().then(|| self.height * self.width)
    }

    /// Re-derive the area from the dimensions.
    ///
    /// With no dimensions the current area is kept: it was entered by hand and
    /// must survive every recompute.
    pub fn recompute_area(&mut self) {
        if let Some(area) = self.computed_area() {
            self.area = area;
        }
    }

    /// Change height and width, re-deriving the area.
    pub fn set_dimensions(&mut self, height: f64, width: f64) -> DomainResult<()> {
        self.height = non_negative("height", height)?;
        self.width = non_negative("width", width)?;
        self.recompute_area();
        Ok(())
    }

    /// Hand-enter the area of a unit without dimensions.
    pub fn set_manual_area(&mut self, area: f64) -> DomainResult<()> {
        if self.has_dimensions() {
            return Err(DomainError::validation(
                "area is derived from height and width; clear the dimensions first",
            ));
        }
        self.area = non_negative("area", area)?;
        Ok(())
    }

    /// True when the bundle carries no information at all.
    pub fn is_blank(&self) -> bool {
        self.height == 0.0
            && self.width == 0.0
            && self.thickness == 0.0
            && self.area == 0.0
            && self.lot_label.is_empty()
            && self.container.is_empty()
            && self.customs_number.is_empty()
    }

    /// Same physical description, ignoring the customs number.
    ///
    /// The customs number is resolved from stock quantities rather than frozen
    /// on the lot, so it is compared separately.
    pub fn describes_same_unit(&self, other: &AttributeSet) -> bool {
        self.height == other.height
            && self.width == other.width
            && self.thickness == other.thickness
            && self.area == other.area
            && self.lot_label == other.lot_label
            && self.container == other.container
    }

    /// Copy of `self` with the customs number replaced.
    pub fn with_resolved_customs(&self, customs_number: &str) -> AttributeSet {
        AttributeSet {
            customs_number: customs_number.to_string(),
            ..self.clone()
        }
    }
}

/// Attribute input where any field may be missing (e.g. a form or an upstream
/// payload that never set it).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PartialAttributes {
    pub height: Option<f64>,
    pub width: Option<f64>,
    pub thickness: Option<f64>,
    pub area: Option<f64>,
    pub lot_label: Option<String>,
    pub container: Option<String>,
    pub customs_number: Option<String>,
}

impl PartialAttributes {
    /// Fill absent numbers with zero and absent text with `""`, then validate.
    ///
    /// When both dimensions are positive the area is derived from them and any
    /// supplied area is ignored.
    pub fn resolve(self) -> DomainResult<AttributeSet> {
        let mut attrs = AttributeSet {
            height: non_negative("height", self.height.unwrap_or(0.0))?,
            width: non_negative("width", self.width.unwrap_or(0.0))?,
            thickness: non_negative("thickness", self.thickness.unwrap_or(0.0))?,
            area: non_negative("area", self.area.unwrap_or(0.0))?,
            lot_label: self.lot_label.unwrap_or_default().trim().to_string(),
            container: self.container.unwrap_or_default(),
            customs_number: self.customs_number.unwrap_or_default(),
        };
        attrs.recompute_area();
        Ok(attrs)
    }
}

fn non_negative(field: &str, value: f64) -> DomainResult<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(DomainError::validation(format!(
            "{field} must be a non-negative number (got {value})"
        )));
    }
    Ok(value)
}
