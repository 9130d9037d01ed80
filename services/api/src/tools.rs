use clap::Args;
use lease_desk::contracts::paginate::DEFAULT_MAX_CHARS_PER_PAGE;
use lease_desk::contracts::upload::MAX_UPLOAD_BYTES;
use lease_desk::contracts::{
    paginate as split_pages, validate_upload as check_upload, ContractServiceError,
    ContractTemplate, FieldMap,
};
use lease_desk::error::AppError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub(crate) struct PaginateArgs {
    /// Plain-text contract to split
    #[arg(long)]
    pub(crate) file: PathBuf,
    /// Character budget per page
    #[arg(long, default_value_t = DEFAULT_MAX_CHARS_PER_PAGE)]
    pub(crate) max_chars: usize,
}

#[derive(Args, Debug)]
pub(crate) struct FillArgs {
    /// Template file with {{token}} placeholders (defaults to the standard lease)
    #[arg(long)]
    pub(crate) template: Option<PathBuf>,
    /// JSON object mapping token names to values
    #[arg(long)]
    pub(crate) fields: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct ValidateUploadArgs {
    /// PDF or DOCX file to check
    #[arg(long)]
    pub(crate) file: PathBuf,
    /// Size ceiling in bytes
    #[arg(long, default_value_t = MAX_UPLOAD_BYTES)]
    pub(crate) max_bytes: usize,
}

pub(crate) fn paginate(args: PaginateArgs) -> Result<(), AppError> {
    let text = fs::read_to_string(&args.file)?;
    let pages = split_pages(&text, args.max_chars);

    println!(
        "{} -> {} page(s) at {} chars per page",
        args.file.display(),
        pages.len(),
        args.max_chars
    );
    for (index, page) in pages.iter().enumerate() {
        println!("\n--- page {} ({} chars) ---", index + 1, page.chars().count());
        println!("{page}");
    }
    Ok(())
}

pub(crate) fn fill(args: FillArgs) -> Result<(), AppError> {
    let template = match &args.template {
        Some(path) => ContractTemplate::new(fs::read_to_string(path)?),
        None => ContractTemplate::standard_lease(),
    };
    let raw = fs::read_to_string(&args.fields)?;
    let fields: FieldMap = serde_json::from_str(&raw).map_err(std::io::Error::from)?;

    let missing = unfilled_tokens(&template, &fields);
    println!("{}", template.fill(&fields));
    if !missing.is_empty() {
        eprintln!("left blank: {}", missing.join(", "));
    }
    Ok(())
}

pub(crate) fn validate_upload(args: ValidateUploadArgs) -> Result<(), AppError> {
    let bytes = fs::read(&args.file)?;
    let declared = guess_mime(&args.file);
    let file_name = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let upload = check_upload(&file_name, &declared, bytes, args.max_bytes)
        .map_err(ContractServiceError::from)?;
    println!("accepted: {}", upload.summary());
    Ok(())
}

fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn unfilled_tokens(template: &ContractTemplate, fields: &FieldMap) -> Vec<String> {
    template
        .tokens()
        .into_iter()
        .filter(|token| fields.get(token).map_or(true, |value| value.is_empty()))
        .collect()
}
