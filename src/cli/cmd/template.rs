use anyhow::Result;
use lateclone::{
    clone::TemplateRegistry, config::Config, machinery::store::Store, uvm::ResourceDescriptor,
};

use crate::{
    cmd::{GetTemplateArgs, TemplateIdArgs},
    ui::message::{message_info, message_warn},
};

async fn open_templates(config: &Config) -> Result<TemplateRegistry<Store>> {
    let store = Store::new(config.absolute_data_dir()).await?;
    Ok(TemplateRegistry::new(store))
}

pub async fn run_list_templates(config: &Config) -> Result<()> {
    let templates = open_templates(config).await?;

    let ids = templates.list_saved_templates()?;
    if ids.is_empty() {
        message_warn("No saved templates");
        return Ok(());
    }

    for id in ids {
        println!("{}", id);
    }

    Ok(())
}

pub async fn run_get_template(config: &Config, args: GetTemplateArgs) -> Result<()> {
    let templates = open_templates(config).await?;

    let template = templates.fetch_template_config(&args.id)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&template)?);
        return Ok(());
    }

    message_info(format!(
        "Template {} ({} resources)",
        template.template_id,
        template.resources.len()
    ));
    for resource in &template.resources {
        let kind = match resource {
            ResourceDescriptor::NetworkShare(_) => "network share",
            ResourceDescriptor::BlockStorage(_) => "block storage",
        };
        println!("{:<14} {}", kind, resource.host_path());
    }

    Ok(())
}

pub async fn run_remove_template(config: &Config, args: TemplateIdArgs) -> Result<()> {
    let templates = open_templates(config).await?;

    templates.remove_saved_template_config(&args.id)?;
    message_info(format!("Removed saved config of template {}", args.id));

    Ok(())
}
