/* This Source Code Form is subject to the terms of the Mozilla Public
* License, v. 2.0. If a copy of the MPL was not distributed with this
* file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::editing::{ErrorConverter, ErrorKind, ErrorPath, FeatureValidationError};
use crate::error::FMLError;
use crate::intermediate_representation::{FeatureDef, PropDef, TypeRef};
use crate::{
    error::Result,
    intermediate_representation::{EnumDef, ObjectDef},
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

pub(crate) struct DefaultsValidator<'a> {
    enum_defs: &'a BTreeMap<String, EnumDef>,
    object_defs: &'a BTreeMap<String, ObjectDef>,
}

impl<'a> DefaultsValidator<'a> {
    pub(crate) fn new(
        enum_defs: &'a BTreeMap<String, EnumDef>,
        object_defs: &'a BTreeMap<String, ObjectDef>,
    ) -> Self {
        Self {
            enum_defs,
            object_defs,
        }
    }

    pub(crate) fn validate_object_def(&self, object_def: &ObjectDef) -> Result<(), FMLError> {
        let mut errors = Default::default();
        let path = ErrorPath::object(&object_def.name);
        for prop in &object_def.props {
            self.validate_types(
                &path.property(&prop.name),
                &prop.typ,
                &prop.default,
                &mut errors,
            );
        }
        if errors.is_empty() {
            Ok(())
        } else {
            let converter = ErrorConverter::new(self.enum_defs, self.object_defs);
            Err(converter.convert_object_error(errors.pop().unwrap()))
        }
    }

    /// This is called as part of the _manifest_ validation only, as part of `fm.validate_defaults()`,
    /// shortly after `fm.validate_schema()`.
    ///
    /// It is not called as part of feature validation, i.e. once the manifest has been loaded
    /// and validated, and now to be used to validate arbitrary JSON.
    ///
    /// It bails with the first detected error. The error detection itself occurs with
    /// the `get_errors` call below.
    ///
    /// It does not check if there are spurious keys in a feature than are defined (this is done in the DefaultsMerger).
    /// It does check if the features enum maps have a complete set of variants as keys.
    ///
    pub(crate) fn validate_feature_def(&self, feature_def: &FeatureDef) -> Result<()> {
        let defaults = feature_def.default_json();
        let errors = self.get_errors(feature_def, &defaults, &defaults);
        self.guard_errors(feature_def, &defaults, errors)?;

        // This is only checking if a Map with an Enum as key has a complete set of keys (i.e. all variants)
        self.validate_feature_enum_maps(feature_def)?;

        // Now check the examples for this feature.
        let path = ErrorPath::feature(&feature_def.name);
        for ex in &feature_def.examples {
            let path = path.example(&ex.metadata.name);
            let errors = self.get_errors_with_path(&path, feature_def, &defaults, &ex.value);
            self.guard_errors(feature_def, &defaults, errors)?;
        }

        Ok(())
    }

    pub(crate) fn guard_errors(
        &self,
        feature_def: &FeatureDef,
        defaults: &Value,
        mut errors: Vec<FeatureValidationError>,
    ) -> Result<()> {
        if !errors.is_empty() {
            let converter = ErrorConverter::new(self.enum_defs, self.object_defs);
            Err(converter.convert_feature_error(feature_def, defaults, errors.pop().unwrap()))
        } else {
            Ok(())
        }
    }

    /// Called as part of validating any feature def against a full JSON defaults (either the default json, or something
    /// merged on to a default json).
    pub(crate) fn get_errors(
        &self,
        feature_def: &FeatureDef,
        merged_value: &Value,
        unmerged_value: &Value,
    ) -> Vec<FeatureValidationError> {
        let path = ErrorPath::feature(&feature_def.name);
        self.get_errors_with_path(&path, feature_def, merged_value, unmerged_value)
    }

    pub(crate) fn get_errors_with_path(
        &self,
        path: &ErrorPath,
        feature_def: &FeatureDef,
        merged_value: &Value,
        unmerged_value: &Value,
    ) -> Vec<FeatureValidationError> {
        let mut errors = Default::default();
        let unmerged_map = unmerged_value
            .as_object()
            .expect("Assumption: an object is the only type that can get here");
        self.validate_props_types(path, &feature_def.props, unmerged_map, &mut errors);
        if !errors.is_empty() {
            return errors;
        }

        let string_aliases = feature_def.get_string_aliases();
        for prop in &feature_def.props {
            if let Some(value) = unmerged_map.get(&prop.name) {
                self.validate_string_aliases(
                    &path.property(&prop.name),
                    &prop.typ,
                    value,
                    &string_aliases,
                    merged_value,
                    &prop.string_alias,
                    &mut errors,
                );
            }
        }
        errors
    }

    fn get_enum(&self, nm: &str) -> Option<&EnumDef> {
        self.enum_defs.get(nm)
    }

    fn get_object(&self, nm: &str) -> Option<&ObjectDef> {
        self.object_defs.get(nm)
    }

    fn validate_feature_enum_maps(&self, feature_def: &FeatureDef) -> Result<()> {
        let path = ErrorPath::feature(&feature_def.name);
        for prop in &feature_def.props {
            let path = path.property(&prop.name);
            self.validate_enum_maps(&path, &prop.typ, &prop.default)?;
        }
        Ok(())
    }

    /// Check enum maps (Map<Enum, T>) have all keys represented.
    ///
    /// We split this out because if the FML has all keys, then any feature configs do as well.
    ///
    /// Thus, we don't need to do the detection when editing a feature config.
    fn validate_enum_maps(
        &self,
        path: &ErrorPath,
        type_ref: &TypeRef,
        default: &Value,
    ) -> Result<()> {
        match (type_ref, default) {
            (TypeRef::Option(inner), v) => {
                self.validate_enum_maps(path, inner, v)?
            }

            (TypeRef::EnumMap(enum_type, map_type), Value::Object(map))
                if matches!(**enum_type, TypeRef::Enum(_)) =>
            {
                let enum_name = enum_type.name().unwrap();
                let enum_def = self
                    .get_enum(enum_name)
                    // If this is thrown, there's a problem in validate_type_ref.
                    .unwrap_or_else(|| {
                        unreachable!("Enum {enum_name} is not defined in the manifest")
                    });

                let mut unseen = HashSet::new();
                if !matches!(**map_type, TypeRef::Option(_)) {
                    for variant in &enum_def.variants {
                        if !map.contains_key(&variant.name) {
                            unseen.insert(variant.name());
                        }
                    }

                    if !unseen.is_empty() {
                        let path = path.open_brace();
                        return Err(FMLError::ValidationError(
                            path.path,
                            format!("Enum map {enum_name} is missing values for {unseen:?}"),
                        ));
                    }
                }

                for (key, value) in map {
                    self.validate_enum_maps(&path.enum_map_key(enum_name, key), map_type, value)?
                }
            }

            (TypeRef::EnumMap(_, map_type), Value::Object(map)) // Map<string-alias, T>
            | (TypeRef::StringMap(map_type), Value::Object(map)) => {
                for (key, value) in map {
                    self.validate_enum_maps(&path.map_key(key), map_type, value)?
                }
            }

            (TypeRef::List(list_type), Value::Array(arr)) => {
                for (index, value) in arr.iter().enumerate() {
                    self.validate_enum_maps(&path.array_index(index), list_type, value)?
                }
            }

            (TypeRef::Object(obj_name), Value::Object(map)) => {
                let obj_def = self
                    .get_object(obj_name)
                    // If this is thrown, there's a problem in validate_type_ref.
                    .unwrap_or_else(|| {
                        unreachable!("Object {obj_name} is not defined in the manifest")
                    });
                let path = path.object_value(obj_name);
                for prop in &obj_def.props {
                    if let Some(value) = map.get(&prop.name) {
                        self.validate_enum_maps(&path.property(&prop.name), &prop.typ, value)?
                    }
                }
            }

            _ => (),
        };
        Ok(())
    }

    fn validate_types(
        &self,
        path: &ErrorPath,
        type_ref: &TypeRef,
        default: &Value,
        errors: &mut Vec<FeatureValidationError>,
    ) {
        match (type_ref, default) {
            (TypeRef::Boolean, Value::Bool(_))
            | (TypeRef::BundleImage, Value::String(_))
            | (TypeRef::BundleText, Value::String(_))
            | (TypeRef::String, Value::String(_))
            | (TypeRef::StringAlias(_), Value::String(_))
            | (TypeRef::Int, Value::Number(_))
            | (TypeRef::Option(_), Value::Null) => (),
            (TypeRef::Option(inner), v) => {
                self.validate_types(path, inner, v, errors)
            }
            (TypeRef::Enum(enum_name), Value::String(s)) => {
                let enum_def = self
                    .get_enum(enum_name)
                    // If this is thrown, there's a problem in validate_type_ref.
                    .unwrap_or_else(|| {
                        unreachable!("Enum {enum_name} is not defined in the manifest")
                    });
                let mut valid = HashSet::new();
                for variant in enum_def.variants() {
                    let name = variant.name();
                    if *s == name {
                        return;
                    }
                    valid.insert(name);
                }
                let path = path.final_error_quoted(s);
                errors.push(FeatureValidationError {
                    path,
                    kind: ErrorKind::invalid_value(type_ref),
                });
            }
            (TypeRef::EnumMap(enum_type, map_type), Value::Object(map))
                if matches!(**enum_type, TypeRef::Enum(_)) =>
            {
                let enum_name = enum_type.name().unwrap();
                let enum_def = self
                    .get_enum(enum_name)
                    // If this is thrown, there's a problem in validate_type_ref.
                    .unwrap_or_else(|| {
                        unreachable!("Enum {enum_name} is not defined in the manifest")
                    });

                // We first validate that the keys of the map cover all all the enum variants, and no more or less
                let mut valid = HashSet::new();
                for variant in &enum_def.variants {
                    let nm = &variant.name;
                    valid.insert(nm.clone());

                    let map_value = map.get(nm);
                    match (map_type.as_ref(), map_value) {
                        (TypeRef::Option(_), None) => (),
                        (_, Some(inner)) => {
                            self.validate_types(&path.enum_map_key(enum_name, nm), map_type, inner, errors);
                        }
                        _ => ()
                    }
                }

                for (map_key, map_value) in map {
                    if !valid.contains(map_key) {
                        let path = path.map_key(map_key);
                        errors.push(FeatureValidationError {
                            path,
                            kind: ErrorKind::invalid_key(enum_type, map),
                        });
                    }

                    self.validate_types(&path.enum_map_key(&enum_def.name, map_key), map_type, map_value, errors);
                }
            }
            (TypeRef::EnumMap(_, map_type), Value::Object(map)) // Map<string-alias, T>
            | (TypeRef::StringMap(map_type), Value::Object(map)) => {
                for (key, value) in map {
                    self.validate_types(&path.map_key(key), map_type, value, errors);
                }
            }
            (TypeRef::List(list_type), Value::Array(arr)) => {
                for (index, value) in arr.iter().enumerate() {
                    self.validate_types(&path.array_index(index), list_type, value, errors);
                }
            }
            (TypeRef::Object(obj_name), Value::Object(map)) => {
                let obj_def = self
                    .get_object(obj_name)
                    // If this is thrown, there's a problem in validate_type_ref.
                    .unwrap_or_else(|| {
                        unreachable!("Object {obj_name} is not defined in the manifest")
                    });
                self.validate_props_types(&path.object_value(obj_name), &obj_def.props, map, errors);
            }
            _ => {
                let path = path.final_error_value(default);
                errors.push(FeatureValidationError {
                    path,
                    kind: ErrorKind::type_mismatch(type_ref),
                });
            }
        };
    }

    fn validate_props_types(
        &self,
        path: &ErrorPath,
        props: &Vec<PropDef>,
        map: &Map<String, Value>,
        errors: &mut Vec<FeatureValidationError>,
    ) {
        let mut valid = HashSet::new();

        for prop in props {
            // We only check the defaults overriding the property defaults
            // from the object's own property defaults.
            // We check the object property defaults previously.
            let prop_name = &prop.name;
            if let Some(map_val) = map.get(prop_name) {
                self.validate_types(&path.property(prop_name), &prop.typ, map_val, errors);
            }

            valid.insert(prop_name.clone());
        }
        for map_key in map.keys() {
            if !valid.contains(map_key) {
                let path = path.final_error_quoted(map_key);
                errors.push(FeatureValidationError {
                    path,
                    kind: ErrorKind::invalid_prop(props, map),
                });
            }
        }
    }

    /// Validate a property against the string aliases in the feature.
    ///
    /// A property can be of any type: this will recurse into the structural types and object types
    /// looking for strings to validate.
    ///
    /// - path The error path at which to report any errors
    /// - typ The type of the value we're validating. Only objects, structural types and string-aliases will do anything.
    ///   We'll be recursing into this type.
    /// - value The value we're validating. We'll be recursing into this value.
    /// - definitions The properties in this feature that define the string-alias types.
    /// - feature_value The merged value for the entire feature
    /// - skip The property we're validating may include a definition
    #[allow(clippy::too_many_arguments)]
    fn validate_string_aliases(
        &self,
        path: &ErrorPath,
        typ: &TypeRef,
        value: &Value,
        definitions: &HashMap<&str, &PropDef>,
        feature_value: &Value,
        skip: &Option<TypeRef>,
        errors: &mut Vec<FeatureValidationError>,
    ) {
        // As an optimization (to stop validating the definition against itself),
        // we want to skip validation on the `skip` type ref: this is only set by the property defining
        // a string-alias.
        let should_validate = |v: &TypeRef| -> bool { skip.as_ref() != Some(v) };
        match (typ, value) {
            (TypeRef::StringAlias(_), Value::String(s)) => {
                if !is_string_alias_value_valid(typ, s, definitions, feature_value) {
                    let path = path.final_error_quoted(s);
                    errors.push(FeatureValidationError {
                        path,
                        kind: ErrorKind::invalid_value(typ),
                    });
                }
            }
            (TypeRef::Option(_), &Value::Null) => (),
            (TypeRef::Option(inner), _) => self.validate_string_aliases(
                path,
                inner,
                value,
                definitions,
                feature_value,
                skip,
                errors,
            ),
            (TypeRef::List(inner), Value::Array(array)) => {
                if should_validate(inner) {
                    for (index, value) in array.iter().enumerate() {
                        self.validate_string_aliases(
                            &path.array_index(index),
                            inner,
                            value,
                            definitions,
                            feature_value,
                            skip,
                            errors,
                        );
                    }
                }
            }
            (TypeRef::EnumMap(key_type, value_type), Value::Object(map)) => {
                if should_validate(key_type) && matches!(**key_type, TypeRef::StringAlias(_)) {
                    for key in map.keys() {
                        if !is_string_alias_value_valid(key_type, key, definitions, feature_value) {
                            let path = path.final_error_quoted(key);
                            errors.push(FeatureValidationError {
                                path,
                                kind: ErrorKind::invalid_key(key_type, map),
                            });
                        }
                    }
                }

                if should_validate(value_type) {
                    for (key, value) in map {
                        self.validate_string_aliases(
                            &path.map_key(key),
                            value_type,
                            value,
                            definitions,
                            feature_value,
                            skip,
                            errors,
                        );
                    }
                }
            }
            (TypeRef::StringMap(vt), Value::Object(map)) => {
                if should_validate(vt) {
                    for (key, value) in map {
                        self.validate_string_aliases(
                            &path.map_key(key),
                            vt,
                            value,
                            definitions,
                            feature_value,
                            skip,
                            errors,
                        );
                    }
                }
            }
            (TypeRef::Object(obj_nm), Value::Object(map)) => {
                let path = path.object_value(obj_nm);
                let obj_def = self.get_object(obj_nm).unwrap();

                for prop in &obj_def.props {
                    let prop_nm = &prop.name;
                    if let Some(value) = map.get(prop_nm) {
                        // string-alias definitions aren't allowed in Object definitions,
                        // so `skip` is None.
                        self.validate_string_aliases(
                            &path.property(prop_nm),
                            &prop.typ,
                            value,
                            definitions,
                            feature_value,
                            &None,
                            errors,
                        );
                    } else {
                        // There is no value in the map, so we need to validate the
                        // default.
                        let mut suberrors = Default::default();
                        self.validate_string_aliases(
                            &ErrorPath::object(obj_nm),
                            &prop.typ,
                            &prop.default,
                            definitions,
                            feature_value,
                            &None,
                            &mut suberrors,
                        );

                        // If the default is invalid, then it doesn't really matter
                        // what the error is, we can just error out.
                        if !suberrors.is_empty() {
                            let path = path.open_brace();
                            errors.push(FeatureValidationError {
                                path,
                                kind: ErrorKind::invalid_nested_value(prop_nm, &prop.typ),
                            });
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn is_string_alias_value_valid(
    alias_type: &TypeRef,
    value: &str,
    definitions: &HashMap<&str, &PropDef>,
    merged_value: &Value,
) -> bool {
    let alias_name = alias_type
        .name()
        .expect("Assumption: this is a StringAlias type, and it has a name");
    // SchemaValidator checked that the property definitely exists.
    let prop = definitions
        .get(alias_name)
        .expect("Assumption: prop is defined by this feature");
    let prop_value = merged_value
        .get(&prop.name)
        .expect("Assumption: value is defined in this feature");
    validate_string_alias_value(value, alias_type, &prop.typ, prop_value)
}

/// Takes
/// - a string value e.g. "Alice"
/// - a string-alias type, StringAlias("TeamMateName") / TeamMateName
/// - a type definition of a wider collection of teammates: e.g. List<TeamMateName>
/// - an a value for the collection of teammates: e.g. ["Alice", "Bonnie", "Charlie", "Dawn"]
///
/// Given the args, returns a boolean: is the string value in the collection?
///
/// This should work with arbitrary collection types, e.g.
/// - TeamMate,
/// - Option<TeamMate>,
/// - List<TeamMate>,
/// - Map<TeamMate, _>
/// - Map<_, TeamMate>
///
/// and any arbitrary nesting of the collection types.
fn validate_string_alias_value(
    value: &str,
    alias_type: &TypeRef,
    def_type: &TypeRef,
    def_value: &Value,
) -> bool {
    match (def_type, def_value) {
        (TypeRef::StringAlias(_), Value::String(s)) if alias_type == def_type => value == s,

        (TypeRef::Option(dt), dv) if dv != &Value::Null => {
            validate_string_alias_value(value, alias_type, dt, dv)
        }
        (TypeRef::EnumMap(kt, _), Value::Object(map)) if alias_type == &**kt => {
            map.contains_key(value)
        }
        (TypeRef::EnumMap(_, vt), Value::Object(map))
        | (TypeRef::StringMap(vt), Value::Object(map)) => {
            let mut found = false;
            for item in map.values() {
                if validate_string_alias_value(value, alias_type, vt, item) {
                    found = true;
                    break;
                }
            }
            found
        }
        (TypeRef::List(k), Value::Array(array)) => {
            let mut found = false;
            for item in array {
                if validate_string_alias_value(value, alias_type, k, item) {
                    found = true;
                    break;
                }
            }
            found
        }

        _ => false,
    }
}
