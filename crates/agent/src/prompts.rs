use tera::{Context, Tera};

use crate::llm::Prompt;

/// Hand-maintained description of the queryable dataset, injected into the
/// router and query-writer prompts. Any schema change to the `retail` table
/// must be mirrored here by hand.
pub const TABLE_DESCRIPTION: &str = "\
You have access to the following tables and columns in a SQLite database:

Retail table `retail`
Customer_ID: A unique ID that identifies each customer.
Name: The customer's name.
Gender: The customer's gender: Male, Female.
Age: The customer's age.
Country: The country where the customer resides.
State: The state where the customer resides.
City: The city where the customer resides.
Zip_Code: The zip code where the customer resides.
Product: The product purchased by the customer.
Category: The category of the product.
Price: The price of the product.
Purchase_Date: The date when the purchase was made.
Quantity: The quantity of the product purchased.
Total_Spent: The total amount spent by the customer.
";

const CAN_ANSWER_TEMPLATE: &str = "\
You are a database reading bot that answers users' questions using information from a database.

{{ data_description }}

Given the user's question, decide whether the question can be answered using the information in the database.

Return a JSON object with two keys, 'reasoning' and 'can_answer', and no preamble or explanation.
Return one of the following JSON:

{\"reasoning\": \"I can find the average total spent by customers in California by averaging the Total_Spent column in the retail table filtered by State = 'CA'\", \"can_answer\": true}
{\"reasoning\": \"I can find the total quantity of products sold in the Electronics category using the Quantity column in the retail table filtered by Category = 'Electronics'\", \"can_answer\": true}
{\"reasoning\": \"I can't answer how many customers will churn next year because the retail table doesn't contain churn information\", \"can_answer\": false}
";

const WRITE_QUERY_TEMPLATE: &str = "\
You are a database reading bot that answers users' questions using information from a database.

{{ data_description }}

In the previous step, you have prepared the following plan: {{ plan }}

Return an SQL query with no preamble or explanation. Don't include any markdown characters or quotation marks around the query.
";

const WRITE_ANSWER_TEMPLATE: &str = "\
You are a database reading bot that answers users' questions using information from a database.

In the previous step, you have planned the query as follows: {{ plan }},
generated the query {{ sql_query }}
and retrieved the following data:
{{ sql_result }}

Return a text answering the user's question using the provided data.
";

const CANNOT_ANSWER_TEMPLATE: &str = "\
You are a database reading bot that answers users' questions using information from a database.

You cannot answer the user's questions because of the following problem: {{ problem }}.

Explain the issue to the user and apologize for the inconvenience.
";

/// The four workflow prompts, registered once as embedded templates.
pub struct PromptSet {
    tera: Tera,
}

impl PromptSet {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_template("can_answer", CAN_ANSWER_TEMPLATE)?;
        tera.add_raw_template("write_query", WRITE_QUERY_TEMPLATE)?;
        tera.add_raw_template("write_answer", WRITE_ANSWER_TEMPLATE)?;
        tera.add_raw_template("cannot_answer", CANNOT_ANSWER_TEMPLATE)?;
        Ok(Self { tera })
    }

    pub fn can_answer(&self, question: &str) -> Result<Prompt, tera::Error> {
        let mut context = Context::new();
        context.insert("data_description", TABLE_DESCRIPTION);
        let system = self.tera.render("can_answer", &context)?;
        Ok(Prompt { system, user: user_turn(question) })
    }

    pub fn write_query(&self, question: &str, plan: &str) -> Result<Prompt, tera::Error> {
        let mut context = Context::new();
        context.insert("data_description", TABLE_DESCRIPTION);
        context.insert("plan", plan);
        let system = self.tera.render("write_query", &context)?;
        Ok(Prompt { system, user: user_turn(question) })
    }

    pub fn write_answer(
        &self,
        question: &str,
        plan: &str,
        sql_query: &str,
        sql_result: &str,
    ) -> Result<Prompt, tera::Error> {
        let mut context = Context::new();
        context.insert("plan", plan);
        context.insert("sql_query", sql_query);
        context.insert("sql_result", sql_result);
        let system = self.tera.render("write_answer", &context)?;
        Ok(Prompt { system, user: user_turn(question) })
    }

    pub fn cannot_answer(&self, question: &str, problem: &str) -> Result<Prompt, tera::Error> {
        let mut context = Context::new();
        context.insert("problem", problem);
        let system = self.tera.render("cannot_answer", &context)?;
        Ok(Prompt { system, user: user_turn(question) })
    }
}

fn user_turn(question: &str) -> String {
    format!("Question: {question}")
}
