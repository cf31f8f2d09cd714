//! Vocabulary used for mirrored resources.
//!
//! Class and property names follow the Nepomuk ontologies (`nie`, `nfo`,
//! `nco`, `nmm`, `nao`) so desktop clients that already understand them can
//! read the harvested graph directly.

pub const RDF_TYPE: &str = "rdf:type";

pub mod class {
    pub const REMOTE_DATA_OBJECT: &str = "nfo:RemoteDataObject";
    pub const DATA_CONTAINER: &str = "nfo:DataContainer";
    pub const PRESENTATION: &str = "nfo:Presentation";
    pub const SPREADSHEET: &str = "nfo:Spreadsheet";
    pub const PAGINATED_TEXT_DOCUMENT: &str = "nfo:PaginatedTextDocument";
    pub const DOCUMENT: &str = "nfo:Document";
    pub const PHOTO: &str = "nmm:Photo";
    pub const EQUIPMENT: &str = "nfo:Equipment";
    pub const CONTACT: &str = "nco:Contact";
    pub const EMAIL_ADDRESS: &str = "nco:EmailAddress";
}

pub mod prop {
    pub const IDENTIFIER: &str = "nao:identifier";
    pub const HAS_TAG: &str = "nao:hasTag";
    pub const DATA_SOURCE: &str = "nie:dataSource";
    pub const CONTENT_LAST_MODIFIED: &str = "nie:contentLastModified";
    pub const CONTENT_CREATED: &str = "nie:contentCreated";
    pub const URL: &str = "nie:url";
    pub const MIME_TYPE: &str = "nie:mimeType";
    pub const TITLE: &str = "nie:title";
    pub const DESCRIPTION: &str = "nie:description";
    pub const IS_PART_OF: &str = "nie:isPartOf";
    pub const FILE_NAME: &str = "nfo:fileName";
    pub const CREATOR: &str = "nco:creator";
    pub const CONTRIBUTOR: &str = "nco:contributor";
    pub const HAS_EMAIL_ADDRESS: &str = "nco:hasEmailAddress";
    pub const EMAIL_ADDRESS: &str = "nco:emailAddress";
    pub const FULLNAME: &str = "nco:fullname";
    pub const WIDTH: &str = "nfo:width";
    pub const HEIGHT: &str = "nfo:height";
    pub const EQUIPMENT: &str = "nfo:equipment";
    pub const MANUFACTURER: &str = "nfo:manufacturer";
    pub const MODEL: &str = "nfo:model";
    pub const EXPOSURE_TIME: &str = "nmm:exposureTime";
    pub const FOCAL_LENGTH: &str = "nmm:focalLength";
    pub const FNUMBER: &str = "nmm:fnumber";
    pub const ISO_SPEED: &str = "nmm:isoSpeed";
    pub const FLASH: &str = "nmm:flash";
}

pub const TAG_FAVORITE: &str = "nao:predefined-tag-favorite";
pub const FLASH_ON: &str = "nmm:flash-on";
pub const FLASH_OFF: &str = "nmm:flash-off";

/// Label providers attach to starred entries.
pub const STARRED_LABEL: &str = "http://schemas.google.com/g/2005/labels#starred";

/// Properties whose objects are sub-resources owned by the subject.
///
/// Deleting the subject deletes these objects too.
pub const OWNED_PROPERTIES: &[&str] = &[prop::EQUIPMENT];

/// Prefixes mapped to full IRIs for SPARQL backends.
pub const PREFIXES: &[(&str, &str)] = &[
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("nao", "http://www.semanticdesktop.org/ontologies/2007/08/15/nao#"),
    ("nie", "http://www.semanticdesktop.org/ontologies/2007/01/19/nie#"),
    ("nfo", "http://www.semanticdesktop.org/ontologies/2007/03/22/nfo#"),
    ("nco", "http://www.semanticdesktop.org/ontologies/2007/03/22/nco#"),
    ("nmm", "http://www.tracker-project.org/temp/nmm#"),
];
