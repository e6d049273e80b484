//! Typed accessors for the release-service entity tree.

use base64::Engine;
use reqwest::multipart::{Form, Part};
use srs_core::hypermedia::LINKS_FIELD;
use srs_core::model::{
    Build, BuildConfig, Execution, ExecutionConfiguration, Extension, InputFile, Manifest,
    NewNamedEntity, NewReleaseCenter, Package, Product, ReleaseCenter,
};
use srs_core::normalize::EntityKind;
use srs_core::types::Payload;

use crate::api::{PortalApi, PortalApiError};
use crate::routes::{self, BuildPath, ExecutionPath};

/// Multipart field carrying the uploaded file.
const UPLOAD_FILE_FIELD: &str = "file";

/// Multipart field carrying the base64 session token. Form uploads cannot
/// rely on the `Authorization` header alone.
const UPLOAD_TOKEN_FIELD: &str = "auth_token";

impl PortalApi {
    // ---- centers, extensions, products ----

    pub async fn list_centers(&self) -> Result<Vec<ReleaseCenter>, PortalApiError> {
        self.get_entity(routes::CENTERS, EntityKind::Center).await
    }

    pub async fn get_center(&self, center: &str) -> Result<ReleaseCenter, PortalApiError> {
        self.get_entity(&routes::center(center), EntityKind::Center).await
    }

    pub async fn list_extensions(&self, center: &str) -> Result<Vec<Extension>, PortalApiError> {
        self.get_entity(&routes::extensions(center), EntityKind::Extension)
            .await
    }

    pub async fn list_products(
        &self,
        center: &str,
        extension: &str,
    ) -> Result<Vec<Product>, PortalApiError> {
        self.get_entity(&routes::products(center, extension), EntityKind::Product)
            .await
    }

    // ---- builds ----

    pub async fn list_builds(
        &self,
        center: &str,
        extension: &str,
        product: &str,
    ) -> Result<Vec<Build>, PortalApiError> {
        self.get_entity(&routes::builds(center, extension, product), EntityKind::Build)
            .await
    }

    pub async fn get_build(&self, build: &BuildPath) -> Result<Build, PortalApiError> {
        self.get_entity(&build.path(), EntityKind::Build).await
    }

    pub async fn get_build_config(&self, build: &BuildPath) -> Result<BuildConfig, PortalApiError> {
        self.get_entity(&build.config(), EntityKind::BuildConfig).await
    }

    // ---- packages ----

    pub async fn list_packages(&self, build: &BuildPath) -> Result<Vec<Package>, PortalApiError> {
        self.get_entity(&build.packages(), EntityKind::Package).await
    }

    pub async fn list_input_files(
        &self,
        build: &BuildPath,
        package: &str,
    ) -> Result<Vec<InputFile>, PortalApiError> {
        self.get_entity(&build.input_files(package), EntityKind::InputFile)
            .await
    }

    pub async fn get_manifest(
        &self,
        build: &BuildPath,
        package: &str,
    ) -> Result<Manifest, PortalApiError> {
        self.get_entity(&build.manifest(package), EntityKind::Manifest)
            .await
    }

    // ---- executions ----

    pub async fn list_executions(&self, build: &BuildPath) -> Result<Vec<Execution>, PortalApiError> {
        self.get_entity(&build.executions(), EntityKind::Execution).await
    }

    pub async fn get_execution(&self, execution: &ExecutionPath) -> Result<Execution, PortalApiError> {
        self.get_entity(&execution.path(), EntityKind::Execution).await
    }

    pub async fn get_execution_configuration(
        &self,
        execution: &ExecutionPath,
    ) -> Result<ExecutionConfiguration, PortalApiError> {
        self.get_entity(&execution.configuration(), EntityKind::ExecutionConfiguration)
            .await
    }

    /// Create a new execution of `build` in the `BEFORE_TRIGGER` state.
    pub async fn create_execution(&self, build: &BuildPath) -> Result<Execution, PortalApiError> {
        let execution: Execution = self
            .post_entity(&build.executions(), None, EntityKind::Execution)
            .await?;
        tracing::info!(build = %build.build, execution_id = %execution.id, "Execution created");
        Ok(execution)
    }

    /// Trigger a configured execution. Returns the execution as the server
    /// now sees it.
    pub async fn trigger_execution(&self, execution: &ExecutionPath) -> Result<Execution, PortalApiError> {
        let updated: Execution = self
            .post_entity(&execution.trigger(), None, EntityKind::Execution)
            .await?;
        tracing::info!(
            execution = %execution,
            status = %updated.status,
            "Execution triggered",
        );
        Ok(updated)
    }

    // ---- maintenance ----

    pub async fn create_center(&self, center: &NewReleaseCenter) -> Result<ReleaseCenter, PortalApiError> {
        center.validate_fields()?;
        let created: ReleaseCenter = self
            .post_entity(routes::CENTERS, Some(&serde_json::to_value(center)?), EntityKind::Center)
            .await?;
        tracing::info!(center_id = %created.id, "Release center created");
        Ok(created)
    }

    pub async fn create_product(
        &self,
        center: &str,
        extension: &str,
        product: &NewNamedEntity,
    ) -> Result<Product, PortalApiError> {
        product.validate_fields()?;
        let created: Product = self
            .post_entity(
                &routes::products(center, extension),
                Some(&serde_json::to_value(product)?),
                EntityKind::Product,
            )
            .await?;
        tracing::info!(center, extension, product_id = %created.id, "Product created");
        Ok(created)
    }

    pub async fn create_build(
        &self,
        center: &str,
        extension: &str,
        product: &str,
        build: &NewNamedEntity,
    ) -> Result<Build, PortalApiError> {
        build.validate_fields()?;
        let created: Build = self
            .post_entity(
                &routes::builds(center, extension, product),
                Some(&serde_json::to_value(build)?),
                EntityKind::Build,
            )
            .await?;
        tracing::info!(product, build_id = %created.id, "Build created");
        Ok(created)
    }

    pub async fn create_package(
        &self,
        build: &BuildPath,
        package: &NewNamedEntity,
    ) -> Result<Package, PortalApiError> {
        package.validate_fields()?;
        let created: Package = self
            .post_entity(
                &build.packages(),
                Some(&serde_json::to_value(package)?),
                EntityKind::Package,
            )
            .await?;
        tracing::info!(build = %build.build, package_id = %created.id, "Package created");
        Ok(created)
    }

    /// Flag a release center as removed. The center stays addressable;
    /// the server hides it from listings.
    pub async fn remove_center(&self, center: &ReleaseCenter) -> Result<ReleaseCenter, PortalApiError> {
        let body = entity_body(&ReleaseCenter {
            removed: true,
            ..center.clone()
        })?;
        let updated: ReleaseCenter = self
            .put_entity(&routes::center(&center.id), &body, EntityKind::Center)
            .await?;
        tracing::info!(center_id = %center.id, "Release center removed");
        Ok(updated)
    }

    /// Delete an uploaded input file. After normalization an input file's
    /// id is its URL.
    pub async fn delete_input_file(&self, file: &InputFile) -> Result<(), PortalApiError> {
        let target = file.url.as_deref().unwrap_or(&file.id);
        self.delete(target).await?;
        tracing::info!(filename = %file.filename, "Input file deleted");
        Ok(())
    }

    // ---- uploads ----

    pub async fn upload_input_file(
        &self,
        build: &BuildPath,
        package: &str,
        filename: &str,
        contents: Vec<u8>,
    ) -> Result<(), PortalApiError> {
        let form = self.upload_form(filename, contents);
        self.post_multipart(&build.input_file(package, filename), form)
            .await?;
        tracing::info!(build = %build.build, package, filename, "Input file uploaded");
        Ok(())
    }

    pub async fn upload_manifest(
        &self,
        build: &BuildPath,
        package: &str,
        filename: &str,
        contents: Vec<u8>,
    ) -> Result<(), PortalApiError> {
        let form = self.upload_form(filename, contents);
        self.post_multipart(&build.manifest(package), form).await?;
        tracing::info!(build = %build.build, package, filename, "Manifest uploaded");
        Ok(())
    }

    // ---- execution output ----

    /// The execution's build log as plain text.
    pub async fn get_execution_output(&self, execution: &ExecutionPath) -> Result<String, PortalApiError> {
        self.get_text(&execution.output(routes::OUTPUT_LOG)).await
    }

    fn upload_form(&self, filename: &str, contents: Vec<u8>) -> Form {
        let form = Form::new().part(
            UPLOAD_FILE_FIELD,
            Part::bytes(contents).file_name(filename.to_string()),
        );
        match self.session().token() {
            Some(token) => form.text(
                UPLOAD_TOKEN_FIELD,
                base64::engine::general_purpose::STANDARD.encode(token),
            ),
            None => form,
        }
    }
}

/// JSON body of an entity being saved: its attributes without the
/// client-side `links` map and resource URL.
fn entity_body<T: serde::Serialize>(entity: &T) -> Result<Payload, PortalApiError> {
    let mut body = serde_json::to_value(entity)?;
    if let Some(object) = body.as_object_mut() {
        object.remove(LINKS_FIELD);
        object.remove("url");
    }
    Ok(body)
}
