//! Abbreviations allowed in inline image dictionaries (`BI` ... `ID`).

use crate::object::{Dict, Object};

const KEY_ABBREVIATIONS: &[(&str, &str)] = &[
    ("BPC", "BitsPerComponent"),
    ("CS", "ColorSpace"),
    ("D", "Decode"),
    ("DP", "DecodeParms"),
    ("F", "Filter"),
    ("H", "Height"),
    ("IM", "ImageMask"),
    ("I", "Interpolate"),
    ("W", "Width"),
];

const VALUE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("G", "DeviceGray"),
    ("RGB", "DeviceRGB"),
    ("CMYK", "DeviceCMYK"),
    ("I", "Indexed"),
    ("AHx", "ASCIIHexDecode"),
    ("A85", "ASCII85Decode"),
    ("LZW", "LZWDecode"),
    ("Fl", "FlateDecode"),
    ("RL", "RunLengthDecode"),
    ("CCF", "CCITTFaxDecode"),
    ("DCT", "DCTDecode"),
];

fn lookup(table: &[(&'static str, &'static str)], name: &str) -> Option<&'static str> {
    table.iter().find(|(abbr, _)| *abbr == name).map(|(_, full)| *full)
}

/// Full form of an abbreviated inline image key.
///
/// # Examples
///
/// ```
/// use pdf_raster::content::inline_image::expand_key;
///
/// assert_eq!(expand_key("BPC"), "BitsPerComponent");
/// assert_eq!(expand_key("Width"), "Width");
/// ```
pub fn expand_key(name: &str) -> &str {
    lookup(KEY_ABBREVIATIONS, name).unwrap_or(name)
}

/// Full form of an abbreviated color space or filter name.
pub fn expand_value(name: &str) -> &str {
    lookup(VALUE_ABBREVIATIONS, name).unwrap_or(name)
}

/// Expand abbreviated keys and name values of an inline image dictionary,
/// recursing into nested dictionaries and arrays.
pub fn expand_dict(dict: &mut Dict) {
    let entries: Vec<(String, Object)> = dict.drain(..).collect();
    for (key, mut value) in entries {
        expand_value_in_place(&mut value);
        dict.insert(expand_key(&key).to_string(), value);
    }
}

fn expand_value_in_place(value: &mut Object) {
    match value {
        Object::Name(name) => {
            if let Some(full) = lookup(VALUE_ABBREVIATIONS, name) {
                *name = full.to_string();
            }
        },
        Object::Dictionary(dict) => expand_dict(dict),
        Object::Array(items) => items.iter_mut().for_each(expand_value_in_place),
        _ => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Object {
        Object::Name(s.to_string())
    }

    #[test]
    fn test_expand_rgb_dct() {
        let mut dict = Dict::new();
        dict.insert("BPC".to_string(), Object::Integer(8));
        dict.insert("CS".to_string(), name("RGB"));
        dict.insert("F".to_string(), name("DCT"));
        expand_dict(&mut dict);

        assert_eq!(dict.get("BitsPerComponent"), Some(&Object::Integer(8)));
        assert_eq!(dict.get("ColorSpace"), Some(&name("DeviceRGB")));
        assert_eq!(dict.get("Filter"), Some(&name("DCTDecode")));
        assert!(dict.get("BPC").is_none());
    }

    #[test]
    fn test_expand_nested() {
        let mut params = Dict::new();
        params.insert("K".to_string(), Object::Integer(-1));
        let mut dict = Dict::new();
        dict.insert("F".to_string(), Object::Array(vec![name("AHx"), name("CCF")]));
        dict.insert("DP".to_string(), Object::Array(vec![Object::Null, Object::Dictionary(params)]));
        dict.insert(
            "CS".to_string(),
            Object::Array(vec![name("I"), name("G"), Object::Integer(1), Object::String(vec![0, 255])]),
        );
        expand_dict(&mut dict);

        assert_eq!(
            dict.get("Filter"),
            Some(&Object::Array(vec![name("ASCIIHexDecode"), name("CCITTFaxDecode")]))
        );
        assert!(dict.get("DecodeParms").is_some());
        let cs = dict.get("ColorSpace").and_then(Object::as_array).expect("array");
        assert_eq!(cs[0], name("Indexed"));
        assert_eq!(cs[1], name("DeviceGray"));
    }

    #[test]
    fn test_unknown_names_untouched() {
        let mut dict = Dict::new();
        dict.insert("Foo".to_string(), name("Bar"));
        dict.insert("IM".to_string(), Object::Boolean(true));
        dict.insert("I".to_string(), Object::Boolean(false));
        expand_dict(&mut dict);
        assert_eq!(dict.get("Foo"), Some(&name("Bar")));
        assert_eq!(dict.get("ImageMask"), Some(&Object::Boolean(true)));
        assert_eq!(dict.get("Interpolate"), Some(&Object::Boolean(false)));
    }
}
